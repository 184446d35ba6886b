//! Validation cache - keyed verdict store with a TTL
//!
//! Keys are normalized addresses. Expiry is checked when an entry is
//! read; nothing sweeps the table in the background.

use std::sync::Arc;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::email::normalize_email;
use crate::domain::result::Result;
use crate::domain::{now_ms, EmailVerdict, ValidationCacheEntry};

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

pub struct ValidationCache {
    repository: Arc<DuckDbRepository>,
    ttl_days: i64,
}

impl ValidationCache {
    pub fn new(repository: Arc<DuckDbRepository>, ttl_days: i64) -> Self {
        Self {
            repository,
            ttl_days,
        }
    }

    pub fn ttl_ms(&self) -> i64 {
        self.ttl_days.saturating_mul(MS_PER_DAY)
    }

    /// Unexpired verdict for `email`, if any
    pub fn lookup(&self, email: &str) -> Result<Option<EmailVerdict>> {
        self.lookup_at(email, now_ms())
    }

    pub fn lookup_at(&self, email: &str, now_ms: i64) -> Result<Option<EmailVerdict>> {
        let key = normalize_email(email);
        Ok(self
            .repository
            .get_cache_entry(&key)?
            .filter(|entry| !entry.is_expired_at(now_ms))
            .map(|entry| entry.verdict))
    }

    /// Store a fresh verdict, replacing whatever was cached for the address
    pub fn store(&self, verdict: &EmailVerdict) -> Result<ValidationCacheEntry> {
        self.store_at(verdict, now_ms())
    }

    pub fn store_at(&self, verdict: &EmailVerdict, now_ms: i64) -> Result<ValidationCacheEntry> {
        let mut verdict = verdict.clone();
        verdict.email = normalize_email(&verdict.email);
        let entry = ValidationCacheEntry {
            verdict,
            expires_at_ms: now_ms.saturating_add(self.ttl_ms()),
            created_at_ms: now_ms,
        };
        self.repository.upsert_cache_entry(&entry)?;
        Ok(entry)
    }
}
