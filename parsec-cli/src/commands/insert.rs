//! Insert command - add identity records from JSON

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::Value;

use super::{authenticate, fail, get_context, read_input};
use crate::output;
use parsec_core::services::{BatchInsertRequest, BatchInsertResponse, InsertRequest};
use parsec_core::{LogEvent, NewIdentity};

/// Accepted payload shapes
enum Payload {
    Single(InsertRequest),
    Batch(BatchInsertRequest),
}

fn parse_payload(raw: &str, skip_if_exists: bool) -> Result<Payload> {
    let value: Value = serde_json::from_str(raw).context("Invalid JSON")?;

    let (has_persons, has_query, bare_skip) = match &value {
        Value::Object(map) => (
            map.contains_key("persons"),
            map.contains_key("query"),
            map.get("skipIfExists").and_then(Value::as_bool).unwrap_or(false),
        ),
        _ => (false, false, false),
    };

    let payload = match value {
        Value::Array(persons) => Payload::Batch(BatchInsertRequest {
            persons,
            skip_if_exists,
        }),
        Value::Object(_) if has_persons => {
            let mut request: BatchInsertRequest =
                serde_json::from_value(value).context("Invalid batch insert request")?;
            request.skip_if_exists |= skip_if_exists;
            Payload::Batch(request)
        }
        Value::Object(_) if has_query => {
            let mut request: InsertRequest =
                serde_json::from_value(value).context("Invalid insert request")?;
            request.skip_if_exists |= skip_if_exists;
            Payload::Single(request)
        }
        // Bare record; a top-level skipIfExists is honoured too
        Value::Object(_) => {
            let query: NewIdentity =
                serde_json::from_value(value).context("Invalid identity record")?;
            Payload::Single(InsertRequest {
                query,
                skip_if_exists: bare_skip || skip_if_exists,
            })
        }
        _ => anyhow::bail!("Expected a JSON object or array of records"),
    };
    Ok(payload)
}

pub fn run(
    token: Option<String>,
    file: Option<PathBuf>,
    skip_if_exists: bool,
    json: bool,
) -> Result<()> {
    let raw = read_input(file.as_deref(), "insert")?;
    let payload = parse_payload(&raw, skip_if_exists)?;

    let ctx = get_context()?;
    let account_id = authenticate(&ctx, token.as_deref())?;

    match payload {
        Payload::Single(request) => {
            let response = ctx
                .insert_service
                .insert_one(&request)
                .map_err(|e| fail(e, json))?;
            ctx.logging.log_best_effort(
                LogEvent::new("identity_inserted")
                    .with_account(account_id)
                    .with_operation("insert"),
            );

            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
                return Ok(());
            }

            output::success(&response.message);
            println!(
                "  #{} {} {} ({})",
                response.person_id, response.data.first_name, response.data.last_name, response.data.zip
            );
        }
        Payload::Batch(request) => {
            let response = ctx
                .insert_service
                .insert_batch(&request)
                .map_err(|e| fail(e, json))?;
            ctx.logging.log_best_effort(
                LogEvent::new("identities_batch_inserted")
                    .with_account(account_id)
                    .with_operation("insert"),
            );

            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
                return Ok(());
            }

            print_batch_summary(&response);
        }
    }

    Ok(())
}

/// Stats line plus a table of per-record failures
fn print_batch_summary(response: &BatchInsertResponse) {
    let stats = &response.stats;
    if stats.failed == 0 {
        output::success(&response.message);
    } else {
        output::warning(&response.message);
    }
    println!(
        "  Total: {}  Inserted: {}  Skipped: {}  Failed: {}",
        stats.total,
        stats.inserted.to_string().green(),
        stats.skipped,
        stats.failed.to_string().red()
    );

    if response.errors.is_empty() {
        return;
    }

    let mut table = output::create_table();
    table.set_header(vec!["Record", "Error", "Details"]);
    for err in &response.errors {
        table.add_row(vec![
            err.index.to_string(),
            err.error.clone(),
            err.details.as_ref().map(|d| d.join("; ")).unwrap_or_default(),
        ]);
    }
    println!("{}", table);
}
