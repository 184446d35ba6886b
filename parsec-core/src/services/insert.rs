//! Insert service - add identity records, one at a time or in batches
//!
//! Inserting requires an authenticated caller but is not metered.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::{Error, Result};
use crate::domain::{NewIdentity, ValidIdentity};

/// Single insert request: `{ query: {...}, skipIfExists }`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertRequest {
    pub query: NewIdentity,
    #[serde(default)]
    pub skip_if_exists: bool,
}

/// Batch request: `{ persons: [...], skipIfExists }`
///
/// Persons stay raw JSON so one malformed record fails alone instead of
/// rejecting the whole batch at deserialization time.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchInsertRequest {
    pub persons: Vec<serde_json::Value>,
    #[serde(default)]
    pub skip_if_exists: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertedSummary {
    pub first_name: String,
    pub last_name: String,
    pub zip: String,
    pub city: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertResponse {
    pub success: bool,
    pub message: String,
    pub person_id: i64,
    pub data: InsertedSummary,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchStats {
    pub total: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchError {
    pub index: usize,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchInsertResponse {
    pub success: bool,
    pub message: String,
    pub stats: BatchStats,
    pub inserted_ids: Vec<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<BatchError>,
}

enum Outcome {
    Inserted(i64),
    Skipped,
}

pub struct InsertService {
    repository: Arc<DuckDbRepository>,
    max_batch: usize,
}

impl InsertService {
    pub fn new(repository: Arc<DuckDbRepository>, max_batch: usize) -> Self {
        Self {
            repository,
            max_batch,
        }
    }

    pub fn insert_one(&self, request: &InsertRequest) -> Result<InsertResponse> {
        let person = request.query.validate().map_err(|errors| {
            Error::invalid_input(format!("Validation failed: {}", errors.join("; ")))
        })?;

        match self.store(&person, request.skip_if_exists)? {
            Outcome::Inserted(person_id) => {
                info!(person_id, "identity inserted");
                Ok(InsertResponse {
                    success: true,
                    message: "Person inserted successfully".to_string(),
                    person_id,
                    data: InsertedSummary {
                        first_name: person.first_name,
                        last_name: person.last_name,
                        zip: person.zip,
                        city: person.city,
                        state: person.state,
                    },
                })
            }
            Outcome::Skipped => Err(Error::AlreadyExists(
                "Person already exists (skipIfExists = true)".to_string(),
            )),
        }
    }

    pub fn insert_batch(&self, request: &BatchInsertRequest) -> Result<BatchInsertResponse> {
        let total = request.persons.len();
        if total == 0 {
            return Err(Error::invalid_input("persons must be a non-empty array"));
        }
        if total > self.max_batch {
            return Err(Error::invalid_input(format!(
                "Maximum {} persons per batch",
                self.max_batch
            )));
        }

        let mut stats = BatchStats {
            total,
            ..Default::default()
        };
        let mut inserted_ids = Vec::new();
        let mut errors = Vec::new();

        for (index, raw) in request.persons.iter().enumerate() {
            match self.insert_raw(raw, request.skip_if_exists) {
                Ok(Outcome::Inserted(id)) => {
                    stats.inserted += 1;
                    inserted_ids.push(id);
                }
                Ok(Outcome::Skipped) => stats.skipped += 1,
                Err(error) => {
                    stats.failed += 1;
                    errors.push(error.at(index));
                }
            }
        }

        info!(
            total,
            inserted = stats.inserted,
            skipped = stats.skipped,
            failed = stats.failed,
            "batch insert completed"
        );

        Ok(BatchInsertResponse {
            success: true,
            message: format!(
                "Batch insert completed: {} inserted, {} skipped, {} failed",
                stats.inserted, stats.skipped, stats.failed
            ),
            stats,
            inserted_ids,
            errors,
        })
    }

    fn insert_raw(
        &self,
        raw: &serde_json::Value,
        skip_if_exists: bool,
    ) -> std::result::Result<Outcome, RecordError> {
        let input: NewIdentity = serde_json::from_value(raw.clone())
            .map_err(|e| RecordError::Invalid(vec![e.to_string()]))?;
        let person = input.validate().map_err(RecordError::Invalid)?;
        self.store(&person, skip_if_exists)
            .map_err(|e| RecordError::Failed(e.to_string()))
    }

    fn store(&self, person: &ValidIdentity, skip_if_exists: bool) -> Result<Outcome> {
        if skip_if_exists
            && self
                .repository
                .identity_exists(&person.first_name, &person.last_name, &person.zip)?
        {
            return Ok(Outcome::Skipped);
        }
        Ok(Outcome::Inserted(self.repository.insert_identity(person)?))
    }
}

enum RecordError {
    Invalid(Vec<String>),
    Failed(String),
}

impl RecordError {
    fn at(self, index: usize) -> BatchError {
        match self {
            RecordError::Invalid(details) => BatchError {
                index,
                error: "Validation failed".to_string(),
                details: Some(details),
            },
            RecordError::Failed(error) => BatchError {
                index,
                error,
                details: None,
            },
        }
    }
}
