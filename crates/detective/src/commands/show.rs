//! Show command - decoded session data and remaining lifetime.

use anyhow::{Result, bail};
use clap::Args;
use console::{Style, style};
use serde::Serialize;

use detective_analysis::{ChatMessage, parse_transcript};
use detective_session::record::{self, SessionData};
use detective_session::{KeyTtl, KeyValueStore, SessionManager};

use super::Context;

/// Arguments for the show command.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Session id
    pub id: String,
}

/// Session details for JSON output.
#[derive(Debug, Serialize)]
struct ShowOutput<'a> {
    id: &'a str,
    ttl_secs: Option<u64>,
    data: &'a SessionData,
}

/// Run the show command.
pub async fn run<S>(args: ShowArgs, ctx: &Context, sessions: &SessionManager<S>) -> Result<()>
where
    S: KeyValueStore + 'static,
{
    let data = sessions.load(&args.id).await;
    if data.is_empty() {
        bail!("session {} not found", args.id);
    }
    let ttl = sessions.ttl(&args.id).await;

    if ctx.json_output {
        let output = ShowOutput {
            id: &args.id,
            ttl_secs: match ttl {
                KeyTtl::Remaining(secs) => Some(secs),
                KeyTtl::NoExpiry | KeyTtl::Absent => None,
            },
            data: &data,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();

    println!();
    println!("{} {}", style("Session").bold(), args.id);
    println!("{}", dim.apply_to("─".repeat(40)));
    let ttl_text = match ttl {
        KeyTtl::Remaining(secs) => format!("{secs}s"),
        KeyTtl::NoExpiry => "no expiry".to_string(),
        KeyTtl::Absent => "expired".to_string(),
    };
    println!("  {} {}", dim.apply_to("Expires in:"), ttl_text);

    for (field, value) in &data {
        if field == record::CHAT_HISTORY {
            continue;
        }
        let text = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        println!("  {} {}", dim.apply_to(format!("{field}:")), excerpt(&text, ctx.verbose));
    }

    if let Some(history) = data.get(record::CHAT_HISTORY) {
        let transcript = parse_transcript(history);
        println!();
        println!("  {} ({} messages)", style("Chat").bold(), transcript.len());
        for message in &transcript {
            let (who, text) = match message {
                ChatMessage::User(text) => (Style::new().cyan().apply_to("user"), text),
                ChatMessage::Ai(text) => (Style::new().green().apply_to("ai  "), text),
            };
            println!("    {} {}", who, excerpt(text, ctx.verbose));
        }
    }
    println!();

    Ok(())
}

/// First line of `text`, cut to 80 characters unless `full`.
fn excerpt(text: &str, full: bool) -> String {
    if full {
        return text.to_string();
    }
    let line = text.lines().next().unwrap_or_default();
    let mut out: String = line.chars().take(80).collect();
    if out.len() < text.len() {
        out.push('…');
    }
    out
}
