//! Account command - provision and inspect metered accounts

use anyhow::Result;
use chrono::Local;
use clap::Subcommand;
use colored::Colorize;
use rust_decimal::Decimal;

use super::{authenticate, fail, get_context};
use crate::output;
use parsec_core::LogEvent;

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Create an account and print its bearer token (shown once)
    Create {
        /// Starting paid balance in USD
        #[arg(long, default_value = "0")]
        balance: Decimal,
        /// Free searches (defaults to the configured allowance)
        #[arg(long)]
        free_searches: Option<i64>,
        /// Free-form label
        #[arg(long)]
        label: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the account behind the token
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all accounts
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Recent searches made by the account
    History {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: AccountCommands, token: Option<String>) -> Result<()> {
    let ctx = get_context()?;

    match command {
        AccountCommands::Create {
            balance,
            free_searches,
            label,
            json,
        } => {
            let created = ctx
                .account_service
                .provision(balance, free_searches, label)
                .map_err(|e| fail(e, json))?;
            ctx.logging.log_best_effort(
                LogEvent::new("account_created")
                    .with_account(created.account.id)
                    .with_operation("account create"),
            );

            if json {
                println!("{}", serde_json::to_string_pretty(&created)?);
                return Ok(());
            }

            output::success(&format!("Created account {}", created.account.id));
            println!("  Balance: {:.2}", created.account.balance);
            println!("  Free searches: {}", created.account.free_searches);
            println!();
            println!("{}", "Token (store it now, it is not shown again):".bold());
            println!("  {}", created.token);
        }
        AccountCommands::Show { json } => {
            let account_id = authenticate(&ctx, token.as_deref())?;
            let account = ctx.account_service.show(account_id).map_err(|e| fail(e, json))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&account)?);
                return Ok(());
            }

            let mut table = output::create_table();
            table.add_row(vec!["Account", &account.id.to_string()]);
            table.add_row(vec!["Label", account.label.as_deref().unwrap_or("-")]);
            table.add_row(vec!["Balance", &format!("{:.2}", account.balance)]);
            table.add_row(vec!["Free searches", &account.free_searches.to_string()]);
            table.add_row(vec![
                "Created",
                &account.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
            ]);
            println!("{}", table);
        }
        AccountCommands::List { json } => {
            let accounts = ctx.account_service.list().map_err(|e| fail(e, json))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&accounts)?);
                return Ok(());
            }

            if accounts.is_empty() {
                output::warning("No accounts. Use 'psc account create' to add one.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["Account", "Label", "Balance", "Free"]);
            for account in &accounts {
                table.add_row(vec![
                    account.id.to_string(),
                    account.label.clone().unwrap_or_default(),
                    format!("{:.2}", account.balance),
                    account.free_searches.to_string(),
                ]);
            }
            println!("{}", table);
        }
        AccountCommands::History { limit, json } => {
            let account_id = authenticate(&ctx, token.as_deref())?;
            let entries = ctx
                .account_service
                .history(account_id, limit)
                .map_err(|e| fail(e, json))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
                return Ok(());
            }

            if entries.is_empty() {
                println!("No searches yet.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["Time", "Query", "Results", "Paid with"]);
            for entry in &entries {
                table.add_row(vec![
                    entry.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
                    output::truncate(&entry.query, 40),
                    entry.result_count.to_string(),
                    entry.credit_source.as_str().to_string(),
                ]);
            }
            println!("{}", table);
        }
    }

    Ok(())
}
