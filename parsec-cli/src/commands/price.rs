//! Price command - email validation price and account entitlement

use anyhow::Result;
use colored::Colorize;

use super::{authenticate, fail, get_context};
use crate::output;

pub fn run(token: Option<String>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let account_id = authenticate(&ctx, token.as_deref())?;
    let price = ctx.price(account_id).map_err(|e| fail(e, json))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&price)?);
        return Ok(());
    }

    println!("{}", "Email validation".bold());
    let mut table = output::create_table();
    table.add_row(vec!["Price per address", &format!("{} {}", price.price, price.currency)]);
    table.add_row(vec!["Balance", &format!("{} {}", price.user_balance, price.currency)]);
    table.add_row(vec!["Free searches", &price.free_searches.to_string()]);
    table.add_row(vec!["Max addresses per check", &price.max_emails_per_check.to_string()]);
    println!("{}", table);
    Ok(())
}
