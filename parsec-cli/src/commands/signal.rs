//! Signal command - search from a normalized upstream signal

use std::path::PathBuf;

use anyhow::{Context, Result};

use super::search::{cli_meta, print_results};
use super::{authenticate, fail, get_context, read_input};
use parsec_core::{LogEvent, Signal};

pub fn run(token: Option<String>, file: Option<PathBuf>, json: bool) -> Result<()> {
    let raw = read_input(file.as_deref(), "signal")?;
    let signal: Signal = serde_json::from_str(&raw).context("Invalid signal JSON")?;

    let ctx = get_context()?;
    let account_id = authenticate(&ctx, token.as_deref())?;

    let response = ctx
        .search_service
        .search_signal(account_id, &signal, &cli_meta())
        .map_err(|e| fail(e, json))?;
    ctx.logging.log_best_effort(
        LogEvent::new("signal_search_completed")
            .with_account(account_id)
            .with_operation("search"),
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    print_results(&response.search, Some(&response.address_matches));
    let matched = response.address_matches.iter().filter(|m| **m).count();
    if matched > 0 {
        println!("{} result(s) share an address with the signal", matched);
    }
    Ok(())
}
