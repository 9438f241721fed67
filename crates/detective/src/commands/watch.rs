//! Watch command - startup sweep, then periodic cleanup until interrupted.

use anyhow::Result;
use clap::Args;
use tokio::sync::watch;

use detective_session::{KeyValueStore, SessionManager};

use super::Context;
use super::sweep::print_report;

/// Arguments for the watch command.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Seconds between cleanup passes (overrides `session.cleanup_interval_secs`)
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,
}

/// Run the watch command.
pub async fn run<S>(_args: WatchArgs, ctx: &Context, sessions: &SessionManager<S>) -> Result<()>
where
    S: KeyValueStore + 'static,
{
    if let Err(e) = sessions.sweeper().ensure_upload_dir() {
        tracing::warn!(error = %e, "Could not create upload directory");
    }

    let report = sessions.run_maintenance().await;
    print_report(&report, ctx)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = sessions.spawn_cleanup_task(shutdown_rx);
    tracing::info!(
        interval_secs = sessions.config().cleanup_interval.as_secs(),
        "Periodic cleanup started"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    let _ = shutdown_tx.send(true);
    if let Err(e) = handle.await {
        tracing::warn!(error = %e, "Cleanup task ended abnormally");
    }

    Ok(())
}
