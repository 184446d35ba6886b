//! Export service - export registry and notifier hand-off

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::{Error, Result};
use crate::domain::{ExportRecord, ExportRow, ResultTuple};
use crate::ports::Notifier;
use crate::services::logging::{LogEvent, LoggingService};

/// Results listed individually in a notification; the rest are counted
pub const NOTIFY_PREVIEW_LEN: usize = 5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResponse {
    pub success: bool,
    pub file_id: String,
    pub location: String,
    pub result_count: i64,
    pub query: String,
    pub processed_at: DateTime<Utc>,
    pub download_url: String,
    pub rows: Vec<ExportRow>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportInfo {
    pub file_id: String,
    pub query: String,
    pub result_count: i64,
    pub location: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyResponse {
    pub success: bool,
    pub message: String,
    pub message_id: String,
    pub result_count: usize,
    pub query: String,
}

/// Plain-text result summary for a notifier
pub fn format_message(query: &str, results: &[ResultTuple], sent_at: DateTime<Utc>) -> String {
    let mut message = String::from("Search Results\n");
    message.push_str(&format!("Query: {}\n", query));
    message.push_str(&format!("Results Found: {}\n\n", results.len()));

    if results.is_empty() {
        message.push_str("No results found.\n");
    }

    for (i, r) in results.iter().take(NOTIFY_PREVIEW_LEN).enumerate() {
        message.push_str(&format!("{}. {} {}\n", i + 1, r[1], r[2]));
        if !r[6].is_empty() {
            message.push_str(&format!("   {}\n", r[6]));
        }
        if !r[7].is_empty() && !r[9].is_empty() {
            message.push_str(&format!("   {}, {} {}\n", r[7], r[9], r[10]));
        }
        message.push('\n');
    }

    if results.len() > NOTIFY_PREVIEW_LEN {
        message.push_str(&format!(
            "... and {} more results\n",
            results.len() - NOTIFY_PREVIEW_LEN
        ));
    }

    message.push_str(&format!(
        "Sent at {}",
        sent_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    ));
    message
}

fn check_request(query: &str, results: &[ResultTuple]) -> Result<()> {
    if results.is_empty() {
        return Err(Error::invalid_input("No results provided"));
    }
    if query.trim().is_empty() {
        return Err(Error::invalid_input("Query required"));
    }
    Ok(())
}

pub struct ExportService {
    repository: Arc<DuckDbRepository>,
    notifier: Arc<dyn Notifier>,
    logging: Arc<LoggingService>,
}

impl ExportService {
    pub fn new(
        repository: Arc<DuckDbRepository>,
        notifier: Arc<dyn Notifier>,
        logging: Arc<LoggingService>,
    ) -> Self {
        Self {
            repository,
            notifier,
            logging,
        }
    }

    pub fn notifier_name(&self) -> &str {
        self.notifier.name()
    }

    /// Register an export of `results` for the account
    pub fn register_export(
        &self,
        account_id: Uuid,
        query: &str,
        results: &[ResultTuple],
    ) -> Result<ExportResponse> {
        check_request(query, results)?;

        let record = ExportRecord::file(account_id, query.trim(), results.len() as i64);
        self.repository.insert_export(&record)?;
        info!(%account_id, file_id = %record.file_id, "export registered");

        Ok(ExportResponse {
            success: true,
            download_url: format!("/api/download-export/{}", record.file_id),
            file_id: record.file_id,
            location: record.location,
            result_count: record.result_count,
            query: record.query,
            processed_at: record.created_at,
            rows: results.iter().map(ExportRow::from).collect(),
        })
    }

    /// Export metadata, visible only to the owning account
    pub fn get_export(&self, account_id: Uuid, file_id: &str) -> Result<ExportInfo> {
        let record = self
            .repository
            .get_export(file_id)?
            .filter(|r| r.account_id == account_id)
            .ok_or_else(|| Error::not_found("Export not found or access denied"))?;

        Ok(ExportInfo {
            file_id: record.file_id,
            query: record.query,
            result_count: record.result_count,
            location: record.location,
            created_at: record.created_at,
        })
    }

    /// Send a result summary through the configured notifier
    pub fn notify(
        &self,
        account_id: Uuid,
        query: &str,
        results: &[ResultTuple],
    ) -> Result<NotifyResponse> {
        check_request(query, results)?;

        let message = format_message(query, results, Utc::now());
        let message_id = match self.notifier.send(&message) {
            Ok(id) => id,
            Err(e) => {
                self.logging.log_best_effort(
                    LogEvent::new("notify_failed")
                        .with_account(account_id)
                        .with_operation(self.notifier.name())
                        .with_error(e.to_string()),
                );
                return Err(e);
            }
        };

        let record = ExportRecord::notification(account_id, query, results.len() as i64);
        if let Err(e) = self.repository.insert_export(&record) {
            warn!(%account_id, "failed to record notification export: {}", e);
        }

        info!(
            %account_id,
            notifier = self.notifier.name(),
            %message_id,
            "results sent"
        );

        Ok(NotifyResponse {
            success: true,
            message: format!("Results sent to {} successfully", self.notifier.name()),
            message_id,
            result_count: results.len(),
            query: query.to_string(),
        })
    }
}
