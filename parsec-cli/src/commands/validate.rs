//! Validate command - classify email addresses

use anyhow::Result;
use colored::Colorize;

use super::{authenticate, fail, get_context};
use crate::output;
use parsec_core::services::validation::BatchItem;
use parsec_core::LogEvent;

pub fn run(token: Option<String>, emails: Vec<String>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let account_id = authenticate(&ctx, token.as_deref())?;

    // One address keeps the single-item response shape
    if let [email] = emails.as_slice() {
        let response = ctx
            .validation_service
            .validate(account_id, email)
            .map_err(|e| fail(e, json))?;
        log_validation(&ctx, account_id);

        if json {
            println!("{}", serde_json::to_string_pretty(&response)?);
            return Ok(());
        }

        let status = if response.valid {
            response.status.as_str().green()
        } else {
            response.status.as_str().red()
        };
        println!("{}  {}", response.email.bold(), status);
        println!("  {}", response.reason);
        println!(
            "  Disposable: {}  Role based: {}  Free provider: {}",
            response.disposable, response.role_based, response.free_domain
        );
        match &response.remaining_balance {
            Some(balance) => output::info(&format!("Charged. Remaining balance: {}", balance)),
            None => output::info("Served from cache, not charged."),
        }
        return Ok(());
    }

    let response = ctx
        .validation_service
        .validate_batch(account_id, &emails)
        .map_err(|e| fail(e, json))?;
    log_validation(&ctx, account_id);

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Email", "Status", "Cached", "Note"]);
    for item in &response.results {
        match item {
            BatchItem::Validated(r) => table.add_row(vec![
                r.email.clone(),
                r.status.as_str().to_string(),
                if r.cached { "yes".into() } else { String::new() },
                r.reason.clone(),
            ]),
            BatchItem::Failed(f) => table.add_row(vec![
                f.email.clone(),
                "error".red().to_string(),
                String::new(),
                f.error.error.clone(),
            ]),
        };
    }
    println!("{}", table);
    println!(
        "{} checked: {} charged, {} cached, {} failed",
        response.total, response.charged, response.cached, response.failed
    );
    Ok(())
}

fn log_validation(ctx: &parsec_core::ParsecContext, account_id: uuid::Uuid) {
    ctx.logging.log_best_effort(
        LogEvent::new("email_validated")
            .with_account(account_id)
            .with_operation("email_validation"),
    );
}
