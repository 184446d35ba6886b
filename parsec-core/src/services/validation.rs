//! Email validation service
//!
//! Flow per address: normalize, reject bad syntax for free, answer from
//! the cache for free, otherwise classify, charge, and cache the verdict.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::email::{classify, is_valid_syntax, normalize_email};
use crate::domain::result::{Error, ErrorBody, Result};
use crate::domain::{EmailVerdict, MeteredOperation, ValidationStatus};
use crate::services::{CreditLedger, ValidationCache};

/// Email validation response DTO
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailValidationResponse {
    pub success: bool,
    pub email: String,
    pub valid: bool,
    pub status: ValidationStatus,
    pub reason: String,
    pub catch_all: Option<bool>,
    pub disposable: bool,
    pub role_based: bool,
    pub free_domain: bool,
    pub cached: bool,
    /// Absent on cache hits, which are not charged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_balance: Option<String>,
}

impl EmailValidationResponse {
    fn from_verdict(verdict: EmailVerdict, cached: bool, remaining_balance: Option<String>) -> Self {
        Self {
            success: true,
            reason: verdict.reason(),
            email: verdict.email,
            valid: verdict.valid,
            status: verdict.status,
            catch_all: verdict.catch_all,
            disposable: verdict.disposable,
            role_based: verdict.role_based,
            free_domain: verdict.free_domain,
            cached,
            remaining_balance,
        }
    }
}

/// Outcome for one address of a batch
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BatchItem {
    Validated(EmailValidationResponse),
    Failed(BatchFailure),
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub email: String,
    #[serde(flatten)]
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchValidationResponse {
    pub success: bool,
    pub total: usize,
    pub charged: usize,
    pub cached: usize,
    pub failed: usize,
    pub results: Vec<BatchItem>,
}

pub struct ValidationService {
    ledger: Arc<CreditLedger>,
    cache: ValidationCache,
    operation: MeteredOperation,
    max_batch: usize,
}

impl ValidationService {
    pub fn new(
        ledger: Arc<CreditLedger>,
        cache: ValidationCache,
        operation: MeteredOperation,
        max_batch: usize,
    ) -> Self {
        Self {
            ledger,
            cache,
            operation,
            max_batch,
        }
    }

    pub fn max_batch(&self) -> usize {
        self.max_batch
    }

    pub fn validate(&self, account_id: Uuid, email: &str) -> Result<EmailValidationResponse> {
        let email = normalize_email(email);
        if !is_valid_syntax(&email) {
            return Err(Error::invalid_input("Invalid email format"));
        }

        if let Some(verdict) = self.cache.lookup(&email)? {
            info!(%account_id, "email validation served from cache");
            return Ok(EmailValidationResponse::from_verdict(verdict, true, None));
        }

        let verdict = classify(&email);
        let receipt = self.ledger.debit(account_id, &self.operation)?;

        // A failed cache write only means the next lookup pays again
        if let Err(e) = self.cache.store(&verdict) {
            warn!(%account_id, "failed to cache email verdict: {}", e);
        }

        info!(
            %account_id,
            status = verdict.status.as_str(),
            "email validated"
        );
        Ok(EmailValidationResponse::from_verdict(
            verdict,
            false,
            Some(format!("{:.2}", receipt.balance)),
        ))
    }

    /// Validate several addresses; each one is handled and charged on its
    /// own, so a failure partway through keeps earlier results
    pub fn validate_batch(
        &self,
        account_id: Uuid,
        emails: &[String],
    ) -> Result<BatchValidationResponse> {
        if emails.is_empty() {
            return Err(Error::invalid_input("emails must be a non-empty array"));
        }
        if emails.len() > self.max_batch {
            return Err(Error::invalid_input(format!(
                "Maximum {} emails per check",
                self.max_batch
            )));
        }

        let mut response = BatchValidationResponse {
            success: true,
            total: emails.len(),
            charged: 0,
            cached: 0,
            failed: 0,
            results: Vec::with_capacity(emails.len()),
        };

        for email in emails {
            match self.validate(account_id, email) {
                Ok(item) => {
                    if item.cached {
                        response.cached += 1;
                    } else {
                        response.charged += 1;
                    }
                    response.results.push(BatchItem::Validated(item));
                }
                Err(e) => {
                    response.failed += 1;
                    response.results.push(BatchItem::Failed(BatchFailure {
                        email: email.clone(),
                        error: ErrorBody::from(&e),
                    }));
                }
            }
        }

        Ok(response)
    }
}
