//! Teardown command - delete a session and its files.

use anyhow::{Result, bail};
use clap::Args;
use console::Style;
use serde::Serialize;

use detective_session::{KeyValueStore, SessionManager};

use super::Context;

/// Arguments for the teardown command.
#[derive(Args, Debug)]
pub struct TeardownArgs {
    /// Session id
    pub id: String,
}

#[derive(Debug, Serialize)]
struct TeardownOutput<'a> {
    id: &'a str,
    torn_down: bool,
}

/// Run the teardown command.
pub async fn run<S>(args: TeardownArgs, ctx: &Context, sessions: &SessionManager<S>) -> Result<()>
where
    S: KeyValueStore + 'static,
{
    let ok = sessions.teardown(&args.id).await;

    if ctx.json_output {
        let output = TeardownOutput {
            id: &args.id,
            torn_down: ok,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else if ok {
        println!(
            "{} Session {} torn down",
            Style::new().green().apply_to("✓"),
            args.id
        );
    }

    if !ok {
        bail!("teardown of session {} did not complete", args.id);
    }
    Ok(())
}
