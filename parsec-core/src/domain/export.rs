//! Export registry records

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Location recorded for exports delivered through the notifier
pub const NOTIFIER_LOCATION: &str = "notifier";

/// `<prefix>_<unix-ms>_<8 hex>`
fn unique_id(prefix: &str, now: &DateTime<Utc>) -> String {
    let mut suffix = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut suffix);
    format!("{}_{}_{}", prefix, now.timestamp_millis(), hex::encode(suffix))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    pub file_id: String,
    pub account_id: Uuid,
    pub query: String,
    pub result_count: i64,
    pub location: String,
    pub created_at: DateTime<Utc>,
}

impl ExportRecord {
    /// New file export with a fresh `file_<unix-ms>_<8 hex>` id
    pub fn file(account_id: Uuid, query: impl Into<String>, result_count: i64) -> Self {
        let now = Utc::now();
        let file_id = unique_id("file", &now);
        let location = format!("/exports/{}.json", file_id);
        Self {
            file_id,
            account_id,
            query: query.into(),
            result_count,
            location,
            created_at: now,
        }
    }

    /// Record of a result summary handed to the notifier
    pub fn notification(account_id: Uuid, query: impl Into<String>, result_count: i64) -> Self {
        let now = Utc::now();
        Self {
            file_id: unique_id("notify", &now),
            account_id,
            query: query.into(),
            result_count,
            location: NOTIFIER_LOCATION.to_string(),
            created_at: now,
        }
    }
}
