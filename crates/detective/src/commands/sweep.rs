//! Sweep command - one maintenance pass.

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use serde::Serialize;

use detective_session::{KeyValueStore, MaintenanceReport, SessionManager};

use super::Context;

/// Arguments for the sweep command.
#[derive(Args, Debug)]
pub struct SweepArgs {}

/// Sweep results for JSON output.
#[derive(Debug, Serialize)]
pub(crate) struct SweepOutput {
    scanned: usize,
    healed: usize,
    torn_down: usize,
    failed: usize,
    uploads_removed: Vec<String>,
    uploads_failed: Vec<String>,
}

impl From<&MaintenanceReport> for SweepOutput {
    fn from(report: &MaintenanceReport) -> Self {
        Self {
            scanned: report.sessions.scanned,
            healed: report.sessions.healed,
            torn_down: report.sessions.torn_down,
            failed: report.sessions.failed,
            uploads_removed: report
                .uploads
                .removed
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
            uploads_failed: report
                .uploads
                .failed
                .iter()
                .map(|f| format!("{}: {}", f.path.display(), f.error))
                .collect(),
        }
    }
}

/// Run the sweep command.
pub async fn run<S>(_args: SweepArgs, ctx: &Context, sessions: &SessionManager<S>) -> Result<()>
where
    S: KeyValueStore + 'static,
{
    let report = sessions.run_maintenance().await;
    print_report(&report, ctx)
}

/// Print a maintenance report in the selected output format.
pub(crate) fn print_report(report: &MaintenanceReport, ctx: &Context) -> Result<()> {
    if ctx.json_output {
        println!("{}", serde_json::to_string(&SweepOutput::from(report))?);
        return Ok(());
    }

    let dim = Style::new().dim();
    let sessions = &report.sessions;

    println!();
    println!("{}", style("Maintenance").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!("  {} {}", dim.apply_to("Sessions scanned:"), sessions.scanned);
    println!("  {} {}", dim.apply_to("TTL restored:"), sessions.healed);
    println!("  {} {}", dim.apply_to("Torn down:"), sessions.torn_down);
    if sessions.failed > 0 {
        println!(
            "  {} {}",
            dim.apply_to("Failed:"),
            Style::new().red().apply_to(sessions.failed)
        );
    }
    println!(
        "  {} {}",
        dim.apply_to("Uploads removed:"),
        report.uploads.removed.len()
    );

    if ctx.verbose {
        for path in &report.uploads.removed {
            println!("    {}", dim.apply_to(path.display()));
        }
    }
    for failure in &report.uploads.failed {
        println!(
            "  {} {}: {}",
            Style::new().red().apply_to("✗"),
            failure.path.display(),
            failure.error
        );
    }
    println!();

    Ok(())
}
