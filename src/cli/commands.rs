use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;

use crate::config::Preferences;
use crate::host::{encode_response, Bridge};

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Query text; `+Title::Body` creates a note, anything else searches
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub text: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SelectArgs {
    /// Action payload previously attached to a result, as JSON
    pub payload: String,
}

pub fn query(
    bridge: &Bridge<'_>,
    prefs: &Preferences,
    args: &QueryArgs,
    out: &mut impl Write,
) -> Result<()> {
    let response = bridge.handle_query(&args.text.join(" "), prefs);
    writeln!(out, "{}", encode_response(&response)).context("writing query response")?;
    Ok(())
}

pub fn select(
    bridge: &Bridge<'_>,
    prefs: &Preferences,
    args: &SelectArgs,
    out: &mut impl Write,
) -> Result<()> {
    let payload: Value =
        serde_json::from_str(&args.payload).context("parsing action payload json")?;
    let response = bridge.handle_selection(&payload, prefs);
    writeln!(out, "{}", encode_response(&response)).context("writing selection response")?;
    Ok(())
}

/// Answers requests line by line until the host closes stdin.
pub fn serve(bridge: &Bridge<'_>, input: impl BufRead, out: &mut impl Write) -> Result<()> {
    tracing::info!("serving host requests on stdin");
    for line in input.lines() {
        let line = line.context("reading host request")?;
        if line.trim().is_empty() {
            continue;
        }
        writeln!(out, "{}", bridge.handle_json(&line)).context("writing host response")?;
        out.flush().context("flushing host response")?;
    }
    tracing::info!("host closed stdin, exiting");
    Ok(())
}
