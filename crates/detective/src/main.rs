//! Detective - session maintenance for the video investigation backend
//!
//! Main entry point for the Detective CLI.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};

use detective_config::LoadedConfig;
use detective_session::{KeyValueStore, MemoryStore, RedisStore, SessionManager};

mod commands;
mod settings;

use commands::{config, list, show, sweep, teardown, watch};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Detective - session maintenance for the video investigation backend
#[derive(Parser)]
#[command(name = "detective")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Load this config file instead of discovering one
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Use an in-process store instead of Redis
    #[arg(long, global = true)]
    pub memory: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one maintenance pass (expired sessions and old uploads)
    Sweep(sweep::SweepArgs),

    /// Run maintenance now, then periodically until Ctrl-C
    Watch(watch::WatchArgs),

    /// List live session ids
    List(list::ListArgs),

    /// Show a session's data and remaining lifetime
    Show(show::ShowArgs),

    /// Delete a session and every file it owns
    Teardown(teardown::TeardownArgs),

    /// Show the resolved configuration
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing: console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "detective=debug,detective_session=debug,detective_analysis=debug,detective_config=debug,info"
    } else {
        "detective=info,detective_session=info,detective_analysis=info,warn"
    };

    let log_dir = detective_config::xdg_config_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "detective.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "detective=trace,detective_session=trace,detective_analysis=trace,detective_config=trace,info",
                )),
        )
        .init();

    let loaded = load_config(cli.config.as_deref())?;
    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }

    let mut session_config = settings::session_config(&loaded.config);
    if let Commands::Watch(args) = &cli.command
        && let Some(secs) = args.interval
    {
        session_config = session_config.with_cleanup_interval(Duration::from_secs(
            secs.clamp(1, detective_config::defaults::MAX_DURATION_SECS),
        ));
    }

    let ctx = commands::Context {
        loaded,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    // The config command never touches the store
    let command = match cli.command {
        Commands::Config(args) => return config::run(args, &ctx).await,
        other => other,
    };

    if cli.memory {
        tracing::debug!("Using in-process store");
        let sessions = SessionManager::new(MemoryStore::new(), session_config);
        return dispatch(command, &ctx, &sessions).await;
    }

    let store_config = ctx.loaded.config.store();
    let url = detective_config::resolve_store_url(&store_config);
    tracing::debug!(
        url = %detective_config::redact_url(&url.value),
        source = %url.source,
        "Connecting to store"
    );
    let store = RedisStore::connect(&url.value, store_config.pool_size)?;
    store
        .ping()
        .await
        .with_context(|| {
            format!(
                "store at {} is unreachable",
                detective_config::redact_url(&url.value)
            )
        })?;

    let sessions = SessionManager::new(store, session_config);
    dispatch(command, &ctx, &sessions).await
}

fn load_config(path: Option<&std::path::Path>) -> Result<LoadedConfig> {
    let loaded = match path {
        Some(path) => detective_config::load_config_file(path)?,
        None => detective_config::load_config(None)?,
    };
    Ok(loaded)
}

/// Dispatch to command handlers.
async fn dispatch<S>(
    command: Commands,
    ctx: &commands::Context,
    sessions: &SessionManager<S>,
) -> Result<()>
where
    S: KeyValueStore + 'static,
{
    match command {
        Commands::Sweep(args) => sweep::run(args, ctx, sessions).await,
        Commands::Watch(args) => watch::run(args, ctx, sessions).await,
        Commands::List(args) => list::run(args, ctx, sessions).await,
        Commands::Show(args) => show::run(args, ctx, sessions).await,
        Commands::Teardown(args) => teardown::run(args, ctx, sessions).await,
        Commands::Config(args) => config::run(args, ctx).await,
    }
}
