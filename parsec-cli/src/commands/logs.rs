//! Logs command - view and manage the event log

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use super::get_parsec_dir;
use crate::output;
use parsec_core::domain::now_ms;
use parsec_core::services::logging::RECONCILIATION_CANDIDATE;
use parsec_core::{EntryPoint, LoggingService};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Show recent log entries
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Show only errors
        #[arg(long)]
        errors: bool,
        /// Show only charges that need reconciliation
        #[arg(long, conflicts_with = "errors")]
        reconcile: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Clear old log entries
    Clear {
        /// Delete logs older than N days
        #[arg(long, default_value = "30")]
        older_than_days: u64,
        /// Required to actually delete
        #[arg(long, short = 'f')]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show log statistics and database path
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn get_logging_service() -> Result<LoggingService> {
    let parsec_dir = get_parsec_dir()?;
    std::fs::create_dir_all(&parsec_dir)?;
    Ok(LoggingService::new(
        &parsec_dir,
        EntryPoint::Cli,
        env!("CARGO_PKG_VERSION"),
    )?)
}

fn format_timestamp(timestamp_ms: i64) -> String {
    use chrono::{Local, TimeZone};
    Local
        .timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

pub fn run(command: LogsCommands) -> Result<()> {
    match command {
        LogsCommands::List {
            limit,
            errors,
            reconcile,
            json,
        } => {
            let service = get_logging_service()?;
            let entries = if reconcile {
                service.get_by_event(RECONCILIATION_CANDIDATE, limit)?
            } else if errors {
                service.get_errors(limit)?
            } else {
                service.get_recent(limit)?
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
                return Ok(());
            }

            if entries.is_empty() {
                println!("No log entries found.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["Time", "Entry", "Event", "Account", "Operation", "Error"]);

            for entry in &entries {
                let error_indicator = if entry.error_message.is_some() {
                    "!".red().to_string()
                } else {
                    String::new()
                };

                table.add_row(vec![
                    format_timestamp(entry.timestamp),
                    entry.entry_point.clone(),
                    entry.event.clone(),
                    entry.account_id.clone().unwrap_or_default(),
                    entry.operation.clone().unwrap_or_default(),
                    error_indicator,
                ]);
            }

            println!("{}", table);

            if !errors && !reconcile {
                let errors_list = service.get_errors(3)?;
                if !errors_list.is_empty() {
                    println!();
                    println!("{}", "Recent Errors:".red().bold());
                    for err in &errors_list {
                        println!(
                            "  {} [{}]: {}",
                            format_timestamp(err.timestamp).dimmed(),
                            err.event,
                            output::truncate(
                                err.error_message.as_deref().unwrap_or("Unknown error"),
                                100
                            )
                        );
                    }
                }
            }
        }
        LogsCommands::Clear {
            older_than_days,
            force,
            json,
        } => {
            if !force {
                output::warning(&format!(
                    "This deletes logs older than {} days. Re-run with --force to confirm.",
                    older_than_days
                ));
                return Ok(());
            }

            let service = get_logging_service()?;
            let cutoff_ms = now_ms() - older_than_days as i64 * DAY_MS;
            let deleted = service.delete_before(cutoff_ms)?;

            if json {
                println!("{}", serde_json::json!({ "deleted": deleted }));
            } else {
                println!("Deleted {} log entries", deleted);
            }
        }
        LogsCommands::Stats { json } => {
            let service = get_logging_service()?;
            let total = service.count()?;
            let errors = service.get_errors(1000)?.len();
            let reconcile = service.get_by_event(RECONCILIATION_CANDIDATE, 1000)?.len();
            let db_path = service.db_path().map(|p| p.to_path_buf());
            let size_bytes = db_path
                .as_ref()
                .and_then(|p| std::fs::metadata(p).ok())
                .map(|m| m.len())
                .unwrap_or(0);

            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "total_entries": total,
                        "error_count": errors,
                        "reconciliation_candidates": reconcile,
                        "database_path": db_path.as_ref().map(|p| p.to_string_lossy().to_string()),
                        "database_size_bytes": size_bytes
                    })
                );
            } else {
                println!("{}", "Log Statistics".bold());
                println!("  Total entries: {}", total);
                println!("  Errors: {}", errors);
                if reconcile > 0 {
                    println!("  Needs reconciliation: {}", reconcile.to_string().yellow());
                }
                if let Some(path) = &db_path {
                    println!("  Database: {}", path.display());
                }
                println!("  Size: {} bytes", size_bytes);
            }
        }
    }

    Ok(())
}
