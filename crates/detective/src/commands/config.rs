//! Config command - show the resolved configuration.

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use serde::Serialize;

use detective_config::{redact_url, resolve_api_key, resolve_store_url};

use super::Context;
use crate::settings;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {}

/// Resolved configuration for JSON output. Secrets are redacted.
#[derive(Debug, Serialize)]
struct ConfigOutput {
    sources: Vec<String>,
    warnings: Vec<String>,
    store_url: String,
    store_url_source: String,
    pool_size: usize,
    key_prefix: String,
    session_ttl_secs: u64,
    cleanup_interval_secs: u64,
    upload_dir: String,
    upload_retention_secs: u64,
    model: String,
    api_key_source: Option<String>,
    history_threshold: usize,
    history_window: usize,
}

/// Run the config command.
pub async fn run(_args: ConfigArgs, ctx: &Context) -> Result<()> {
    let loaded = &ctx.loaded;
    let config = &loaded.config;

    let store = config.store();
    let url = resolve_store_url(&store);
    let api_key = resolve_api_key(&config.analysis());
    let session = settings::session_config(config);
    let analyst = settings::analyst_config(&config.analysis());

    let output = ConfigOutput {
        sources: loaded
            .loaded_from()
            .iter()
            .map(|p| p.display().to_string())
            .collect(),
        warnings: loaded.warnings.clone(),
        store_url: redact_url(&url.value),
        store_url_source: url.source.to_string(),
        pool_size: store.pool_size,
        key_prefix: session.key_prefix.clone(),
        session_ttl_secs: session.session_ttl.as_secs(),
        cleanup_interval_secs: session.cleanup_interval.as_secs(),
        upload_dir: session.upload_dir.display().to_string(),
        upload_retention_secs: session.upload_retention.as_secs(),
        model: analyst.model.clone(),
        api_key_source: api_key.map(|k| k.source.to_string()),
        history_threshold: analyst.history.threshold,
        history_window: analyst.history.window,
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    let row = |label: &str, value: &dyn std::fmt::Display| {
        println!("  {:<20} {}", dim.apply_to(label), value);
    };

    println!("{}", style("# Detective Configuration").bold());
    println!();
    if output.sources.is_empty() {
        println!("No config files loaded (using defaults)");
    } else {
        for source in &output.sources {
            println!("Loaded: {source}");
        }
    }
    for warning in &output.warnings {
        println!("{} {}", Style::new().yellow().apply_to("warning:"), warning);
    }
    println!();

    println!("{}", style("[store]").bold());
    row("url", &format!("{} ({})", output.store_url, output.store_url_source));
    row("pool_size", &output.pool_size);
    row("key_prefix", &output.key_prefix);

    println!("{}", style("[session]").bold());
    row("ttl_secs", &output.session_ttl_secs);
    row("cleanup_interval", &output.cleanup_interval_secs);

    println!("{}", style("[uploads]").bold());
    row("dir", &output.upload_dir);
    row("retention_secs", &output.upload_retention_secs);

    println!("{}", style("[analysis]").bold());
    row("model", &output.model);
    row(
        "api_key",
        &output.api_key_source.as_deref().unwrap_or("not set"),
    );
    if ctx.verbose {
        row("poll_interval_secs", &analyst.poll_interval.as_secs());
        row("history_threshold", &output.history_threshold);
        row("history_window", &output.history_window);
        row("reply_excerpt", &analyst.history.excerpt_chars);
    }

    Ok(())
}
