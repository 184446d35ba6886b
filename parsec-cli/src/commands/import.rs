//! Import command - bulk-load identity records from CSV

use std::path::Path;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use serde_json::{Map, Value};

use super::{authenticate, fail, get_context};
use crate::output;
use parsec_core::services::{BatchInsertRequest, BatchInsertResponse};
use parsec_core::LogEvent;

/// Combined outcome across all chunks
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImportSummary {
    success: bool,
    rows: usize,
    inserted: usize,
    skipped: usize,
    failed: usize,
    inserted_ids: Vec<i64>,
    errors: Vec<ImportError>,
}

#[derive(Debug, Serialize)]
struct ImportError {
    row: usize,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<String>>,
}

impl ImportSummary {
    /// Fold one chunk in; `offset` is the chunk's first data row index
    fn absorb(&mut self, offset: usize, chunk: BatchInsertResponse) {
        self.inserted += chunk.stats.inserted;
        self.skipped += chunk.stats.skipped;
        self.failed += chunk.stats.failed;
        self.inserted_ids.extend(chunk.inserted_ids);
        for err in chunk.errors {
            self.errors.push(ImportError {
                // 1-based, counting the header line
                row: offset + err.index + 2,
                error: err.error,
                details: err.details,
            });
        }
    }
}

/// `First Name`, `first-name` and `firstName` all become `first_name`
fn normalize_header(header: &str) -> String {
    let mut out = String::new();
    let mut prev_lower = false;
    for c in header.trim().chars() {
        if c == ' ' || c == '-' || c == '_' {
            if !out.ends_with('_') && !out.is_empty() {
                out.push('_');
            }
            prev_lower = false;
        } else if c.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
        }
    }
    match out.as_str() {
        "firstname" | "first" => "first_name".to_string(),
        "lastname" | "last" | "surname" => "last_name".to_string(),
        "middlename" | "middle_name" | "middle" => "middle_names".to_string(),
        "zipcode" | "zip_code" | "postal_code" => "zip".to_string(),
        "street" | "street_address" => "address".to_string(),
        _ => out,
    }
}

/// Read every CSV row as a JSON object keyed by normalized header.
/// Empty cells are omitted so they count as missing fields.
fn read_rows(path: &Path) -> Result<Vec<Value>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open CSV file: {:?}", path))?;

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read CSV header")?
        .iter()
        .map(normalize_header)
        .collect();

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Malformed CSV at row {}", i + 2))?;
        let mut object = Map::new();
        for (header, cell) in headers.iter().zip(record.iter()) {
            if !cell.is_empty() && !header.is_empty() {
                object.insert(header.clone(), Value::String(cell.to_string()));
            }
        }
        rows.push(Value::Object(object));
    }
    Ok(rows)
}

pub fn run(token: Option<String>, file: &Path, skip_if_exists: bool, json: bool) -> Result<()> {
    let rows = read_rows(file)?;

    let ctx = get_context()?;
    let account_id = authenticate(&ctx, token.as_deref())?;

    if rows.is_empty() {
        if json {
            println!("{}", serde_json::to_string_pretty(&ImportSummary::default())?);
        } else {
            output::warning("CSV file has no data rows.");
        }
        return Ok(());
    }

    let chunk_size = ctx.config.max_batch_insert;
    let progress = if json {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(rows.len() as u64)
    };
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
    ) {
        progress.set_style(style);
    }

    let mut summary = ImportSummary {
        rows: rows.len(),
        ..Default::default()
    };

    for (n, chunk) in rows.chunks(chunk_size).enumerate() {
        let request = BatchInsertRequest {
            persons: chunk.to_vec(),
            skip_if_exists,
        };
        let response = match ctx.insert_service.insert_batch(&request) {
            Ok(response) => response,
            Err(e) => {
                progress.abandon_with_message("import stopped");
                return Err(fail(e, json));
            }
        };
        progress.inc(chunk.len() as u64);
        progress.set_message(format!("{} inserted", summary.inserted + response.stats.inserted));
        summary.absorb(n * chunk_size, response);
    }
    progress.finish_and_clear();

    summary.success = true;
    ctx.logging.log_best_effort(
        LogEvent::new("csv_imported")
            .with_account(account_id)
            .with_operation("import"),
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let report = if summary.failed == 0 {
        output::success
    } else {
        output::warning
    };
    report(&format!(
        "Imported {} of {} rows ({} skipped, {} failed)",
        summary.inserted, summary.rows, summary.skipped, summary.failed
    ));
    if !summary.errors.is_empty() {
        let mut table = output::create_table();
        table.set_header(vec!["Row", "Error", "Details"]);
        for err in &summary.errors {
            table.add_row(vec![
                err.row.to_string(),
                err.error.clone(),
                err.details.as_ref().map(|d| d.join("; ")).unwrap_or_default(),
            ]);
        }
        println!("{}", table);
    }
    Ok(())
}
