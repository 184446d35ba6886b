//! Search command - run a criteria-string search

use anyhow::Result;
use colored::Colorize;

use super::{authenticate, fail, get_context};
use crate::output;
use parsec_core::services::SearchResponse;
use parsec_core::{LogEvent, RequestMeta, ResultTuple};

pub fn run(token: Option<String>, query: &str, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let account_id = authenticate(&ctx, token.as_deref())?;

    let response = ctx
        .search_service
        .search(account_id, query, &cli_meta())
        .map_err(|e| fail(e, json))?;
    ctx.logging.log_best_effort(
        LogEvent::new("search_completed")
            .with_account(account_id)
            .with_operation("search"),
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    print_results(&response, None);
    Ok(())
}

/// Request metadata recorded for CLI searches
pub fn cli_meta() -> RequestMeta {
    RequestMeta {
        ip_address: None,
        user_agent: Some(format!("psc/{}", env!("CARGO_PKG_VERSION"))),
    }
}

/// Table of results plus the charge summary. `matches` marks rows whose
/// address correlates with the signal.
pub fn print_results(response: &SearchResponse, matches: Option<&[bool]>) {
    println!(
        "{} {}",
        "Query:".bold(),
        response.query
    );

    if response.results.is_empty() {
        output::warning("No matching records.");
    } else {
        let mut table = output::create_table();
        let mut header = vec!["ID", "Name", "DOB", "Address", "City", "State", "Zip"];
        if matches.is_some() {
            header.push("Match");
        }
        table.set_header(header);

        for (i, row) in response.results.iter().enumerate() {
            let mut cells = row_cells(row);
            if let Some(flags) = matches {
                let hit = flags.get(i).copied().unwrap_or(false);
                cells.push(if hit { "✓".green().to_string() } else { String::new() });
            }
            table.add_row(cells);
        }
        println!("{}", table);
    }

    println!("{} result(s)", response.count);
    if response.truncated {
        output::warning("Result cap reached; narrow the criteria to see everything.");
    }

    if response.used_paid_balance {
        output::info(&format!(
            "Charged to paid balance. Remaining balance: {}",
            response.remaining_paid_balance
        ));
    } else {
        output::info(&format!(
            "Used a free search. Free searches left: {}",
            response.remaining_free_searches
        ));
    }
}

fn row_cells(row: &ResultTuple) -> Vec<String> {
    let name = [&row[1], &row[3], &row[2]]
        .iter()
        .filter(|s| !s.is_empty())
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    vec![
        row[0].clone(),
        output::truncate(&name, 32),
        row[5].clone(),
        output::truncate(&row[6], 32),
        row[7].clone(),
        row[9].clone(),
        row[10].clone(),
    ]
}
