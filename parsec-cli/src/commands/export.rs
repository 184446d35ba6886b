//! Export command - register, inspect and send search results

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use clap::Subcommand;
use colored::Colorize;
use serde_json::Value;

use super::{authenticate, fail, get_context, read_input};
use crate::output;
use parsec_core::{LogEvent, ResultTuple};

#[derive(Subcommand)]
pub enum ExportCommands {
    /// Register an export of search results
    Create {
        /// Query the results came from
        query: String,
        /// JSON file with result tuples or a `psc search --json` response
        /// (reads stdin when omitted)
        #[arg(long)]
        results: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a registered export owned by the account
    Show {
        /// Export file id
        file_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Send a result summary through the configured notifier
    Notify {
        /// Query the results came from
        query: String,
        /// JSON file with result tuples or a `psc search --json` response
        /// (reads stdin when omitted)
        #[arg(long)]
        results: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Accepts either a bare array of tuples or any object with a `results`
/// array, so search output can be piped straight in.
fn parse_results(raw: &str) -> Result<Vec<ResultTuple>> {
    let value: Value = serde_json::from_str(raw).context("Invalid results JSON")?;
    let rows = match value {
        Value::Object(mut map) => map
            .remove("results")
            .context("Expected a `results` array in the JSON object")?,
        other => other,
    };
    serde_json::from_value(rows).context("Results must be arrays of 20 strings")
}

fn load_results(file: Option<&Path>) -> Result<Vec<ResultTuple>> {
    parse_results(&read_input(file, "results")?)
}

pub fn run(command: ExportCommands, token: Option<String>) -> Result<()> {
    match command {
        ExportCommands::Create {
            query,
            results,
            json,
        } => {
            let rows = load_results(results.as_deref())?;
            let ctx = get_context()?;
            let account_id = authenticate(&ctx, token.as_deref())?;

            let export = ctx
                .export_service
                .register_export(account_id, &query, &rows)
                .map_err(|e| fail(e, json))?;
            ctx.logging.log_best_effort(
                LogEvent::new("export_registered")
                    .with_account(account_id)
                    .with_operation("export"),
            );

            if json {
                println!("{}", serde_json::to_string_pretty(&export)?);
                return Ok(());
            }

            output::success(&format!(
                "Registered export of {} result(s)",
                export.result_count
            ));
            println!("  File id:  {}", export.file_id.bold());
            println!("  Location: {}", export.location);
            println!("  Download: {}", export.download_url);
        }
        ExportCommands::Show { file_id, json } => {
            let ctx = get_context()?;
            let account_id = authenticate(&ctx, token.as_deref())?;
            let info = ctx
                .export_service
                .get_export(account_id, &file_id)
                .map_err(|e| fail(e, json))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
                return Ok(());
            }

            let mut table = output::create_table();
            table.add_row(vec!["File id", &info.file_id]);
            table.add_row(vec!["Query", &output::truncate(&info.query, 60)]);
            table.add_row(vec!["Results", &info.result_count.to_string()]);
            table.add_row(vec!["Location", &info.location]);
            table.add_row(vec![
                "Created",
                &info.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
            ]);
            println!("{}", table);
        }
        ExportCommands::Notify {
            query,
            results,
            json,
        } => {
            let rows = load_results(results.as_deref())?;
            let ctx = get_context()?;
            let account_id = authenticate(&ctx, token.as_deref())?;

            if !ctx.config.telegram_configured() && !json {
                output::warning("No notifier configured; set PARSEC_TELEGRAM_BOT_TOKEN and PARSEC_TELEGRAM_CHAT_ID.");
            }

            let sent = ctx
                .export_service
                .notify(account_id, &query, &rows)
                .map_err(|e| fail(e, json))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&sent)?);
                return Ok(());
            }

            output::success(&sent.message);
            output::info(&format!(
                "Message {} via {} ({} result(s))",
                sent.message_id,
                ctx.export_service.notifier_name(),
                sent.result_count
            ));
        }
    }

    Ok(())
}
