//! List command - live session ids.

use anyhow::Result;
use clap::Args;
use console::Style;

use detective_session::{KeyValueStore, SessionManager};

use super::Context;

/// Arguments for the list command.
#[derive(Args, Debug)]
pub struct ListArgs {}

/// Run the list command.
pub async fn run<S>(_args: ListArgs, ctx: &Context, sessions: &SessionManager<S>) -> Result<()>
where
    S: KeyValueStore + 'static,
{
    let mut ids = sessions.list_sessions().await;
    ids.sort();

    if ctx.json_output {
        println!("{}", serde_json::to_string(&ids)?);
        return Ok(());
    }

    if ids.is_empty() {
        println!("{}", Style::new().dim().apply_to("No sessions"));
        return Ok(());
    }
    for id in &ids {
        println!("{id}");
    }
    Ok(())
}
