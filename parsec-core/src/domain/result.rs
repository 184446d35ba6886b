//! Result and error types for the core library

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core library error type
///
/// Every variant has exactly one attributable cause. Client-side variants
/// (400-409) are surfaced as-is and never retried by the core.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Insufficient credit (balance {balance}, free searches {free_searches})")]
    InsufficientCredit {
        balance: Decimal,
        free_searches: i64,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Query execution error: {0}")]
    QueryExecution(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Upstream notification failure: {0}")]
    UpstreamNotification(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn invalid_query(msg: impl Into<String>) -> Self {
        Self::InvalidQuery(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Unauthenticated(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// HTTP status code a transport layer should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidQuery(_) | Error::InvalidInput(_) => 400,
            Error::Unauthenticated(_) => 401,
            Error::InsufficientCredit { .. } => 402,
            Error::NotFound(_) => 404,
            Error::AlreadyExists(_) => 409,
            Error::UpstreamNotification(_) => 502,
            Error::QueryExecution(_)
            | Error::Storage(_)
            | Error::Config(_)
            | Error::Io(_)
            | Error::Json(_) => 500,
        }
    }

    /// Message safe to return to a client. Server-side failures are
    /// collapsed into a generic message; the detail stays in the logs.
    pub fn public_message(&self) -> String {
        match self.status_code() {
            500 => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<duckdb::Error> for Error {
    fn from(e: duckdb::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// Error response body for a transport layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_balance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_free_searches: Option<i64>,
}

impl From<&Error> for ErrorBody {
    fn from(e: &Error) -> Self {
        let (remaining_balance, remaining_free_searches) = match e {
            Error::InsufficientCredit {
                balance,
                free_searches,
            } => (Some(format!("{:.2}", balance)), Some(*free_searches)),
            _ => (None, None),
        };
        Self {
            success: false,
            error: e.public_message(),
            remaining_balance,
            remaining_free_searches,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::invalid_query("x").status_code(), 400);
        assert_eq!(Error::invalid_input("x").status_code(), 400);
        assert_eq!(Error::unauthenticated("x").status_code(), 401);
        let credit = Error::InsufficientCredit {
            balance: Decimal::new(25, 2),
            free_searches: 0,
        };
        assert_eq!(credit.status_code(), 402);
        assert_eq!(Error::AlreadyExists("x".into()).status_code(), 409);
        assert_eq!(Error::storage("disk").status_code(), 500);
    }

    #[test]
    fn test_server_errors_hide_detail() {
        let err = Error::QueryExecution("relation identities does not exist".into());
        assert_eq!(err.public_message(), "Internal server error");

        let body = ErrorBody::from(&Error::invalid_input("zip must be a valid 5-digit ZIP code"));
        assert!(body.error.contains("zip"));
    }

    #[test]
    fn test_insufficient_credit_reports_balance() {
        let err = Error::InsufficientCredit {
            balance: Decimal::new(25, 2),
            free_searches: 0,
        };
        let body = ErrorBody::from(&err);
        assert_eq!(body.remaining_balance.as_deref(), Some("0.25"));
        assert_eq!(body.remaining_free_searches, Some(0));
        assert!(!body.success);
    }
}
