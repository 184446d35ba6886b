//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for storage (identities, ledger, cache, audit, exports)
//! - Telegram Bot API for the Notifier port
//! - Hashed bearer tokens for the Authenticator port

pub mod duckdb;
pub mod query_plan;
pub mod telegram;
pub mod token_auth;

#[cfg(test)]
pub mod telegram_mock;
