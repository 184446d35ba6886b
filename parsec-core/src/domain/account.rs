//! Account domain model

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A metered account. Balance and free searches are only ever changed by
/// the credit ledger after provisioning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    /// SHA-256 hex digest of the account's bearer token
    pub auth_identity: String,
    pub label: Option<String>,
    pub balance: Decimal,
    pub free_searches: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(auth_identity: impl Into<String>, balance: Decimal, free_searches: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            auth_identity: auth_identity.into(),
            label: None,
            balance,
            free_searches,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate account data
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.auth_identity.trim().is_empty() {
            return Err("auth identity cannot be empty");
        }
        if self.balance < Decimal::ZERO {
            return Err("balance cannot be negative");
        }
        if self.free_searches < 0 {
            return Err("free searches cannot be negative");
        }
        Ok(())
    }
}

/// Which allowance paid for a metered operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreditSource {
    Free,
    Paid,
}

impl CreditSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditSource::Free => "free",
            CreditSource::Paid => "paid",
        }
    }
}

/// An operation the ledger charges for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeteredOperation {
    pub name: &'static str,
    pub cost: Decimal,
    /// Whether free-search units are consumed before paid balance
    pub uses_free_allowance: bool,
}

/// Outcome of a successful debit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DebitReceipt {
    pub account_id: Uuid,
    pub source: CreditSource,
    pub charged: Decimal,
    /// Balance after the debit
    pub balance: Decimal,
    /// Free searches after the debit
    pub free_searches: i64,
}

impl DebitReceipt {
    /// Human-readable charge, e.g. `0.50` or `1 free search`
    pub fn charge_label(&self) -> String {
        match self.source {
            CreditSource::Free => "1 free search".to_string(),
            CreditSource::Paid => format!("{:.2}", self.charged),
        }
    }
}

/// Convert a monetary amount to whole cents, rounding half away from zero
pub fn to_cents(amount: Decimal) -> i64 {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(i64::MAX)
}

/// Convert whole cents to a two-decimal amount
pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cents_conversion() {
        assert_eq!(to_cents(Decimal::new(50, 2)), 50);
        assert_eq!(to_cents(Decimal::new(1005, 3)), 101);
        assert_eq!(from_cents(10000), Decimal::new(10000, 2));
        assert_eq!(format!("{:.2}", from_cents(9950)), "99.50");
    }

    #[test]
    fn test_account_validation() {
        let mut account = Account::new("abc", Decimal::new(100, 0), 3);
        assert!(account.validate().is_ok());

        account.free_searches = -1;
        assert!(account.validate().is_err());

        account.free_searches = 0;
        account.balance = Decimal::new(-1, 2);
        assert!(account.validate().is_err());
    }
}
