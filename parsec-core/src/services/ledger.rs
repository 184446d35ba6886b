//! Credit ledger - free allowance and paid balance per account
//!
//! Every metered operation is charged exactly once, from exactly one
//! source, in this order:
//! 1. one free search, if the operation consumes the free allowance and
//!    any remain
//! 2. the unit cost from the paid balance, if the balance covers it
//! 3. otherwise `InsufficientCredit`
//!
//! Each step is a single guarded update in the store; nothing here reads a
//! balance and then writes it back.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::{Error, Result};
use crate::domain::{
    from_cents, to_cents, Account, CreditSource, DebitReceipt, MeteredOperation,
};

pub const CURRENCY: &str = "USD";

/// Price/entitlement answer for email validation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceResponse {
    pub success: bool,
    pub price: String,
    pub currency: String,
    pub user_balance: String,
    pub free_searches: i64,
    pub max_emails_per_check: usize,
    pub user_id: Uuid,
}

pub struct CreditLedger {
    repository: Arc<DuckDbRepository>,
}

impl CreditLedger {
    pub fn new(repository: Arc<DuckDbRepository>) -> Self {
        Self { repository }
    }

    /// Current account state; unknown ids are `Unauthenticated`
    pub fn account(&self, account_id: Uuid) -> Result<Account> {
        self.repository
            .get_account(account_id)?
            .ok_or_else(|| Error::unauthenticated("unknown account"))
    }

    /// Charge one unit of `operation` to the account
    pub fn debit(&self, account_id: Uuid, operation: &MeteredOperation) -> Result<DebitReceipt> {
        if operation.uses_free_allowance {
            if let Some((balance_cents, free_searches)) = self.repository.debit_free(account_id)? {
                info!(
                    %account_id,
                    operation = operation.name,
                    free_searches,
                    "debited free allowance"
                );
                return Ok(DebitReceipt {
                    account_id,
                    source: CreditSource::Free,
                    charged: rust_decimal::Decimal::ZERO,
                    balance: from_cents(balance_cents),
                    free_searches,
                });
            }
        }

        let cost_cents = to_cents(operation.cost);
        if let Some((balance_cents, free_searches)) =
            self.repository.debit_paid(account_id, cost_cents)?
        {
            info!(
                %account_id,
                operation = operation.name,
                cost_cents,
                balance_cents,
                "debited paid balance"
            );
            return Ok(DebitReceipt {
                account_id,
                source: CreditSource::Paid,
                charged: from_cents(cost_cents),
                balance: from_cents(balance_cents),
                free_searches,
            });
        }

        // Neither guard matched: report the state that refused the charge
        let account = self.account(account_id)?;
        info!(
            %account_id,
            operation = operation.name,
            "insufficient credit"
        );
        Err(Error::InsufficientCredit {
            balance: account.balance,
            free_searches: account.free_searches,
        })
    }

    /// Unit price of `operation` and what the account holds
    pub fn price(
        &self,
        account_id: Uuid,
        operation: &MeteredOperation,
        max_per_call: usize,
    ) -> Result<PriceResponse> {
        let account = self.account(account_id)?;
        Ok(PriceResponse {
            success: true,
            price: format!("{:.2}", operation.cost),
            currency: CURRENCY.to_string(),
            user_balance: format!("{:.2}", account.balance),
            free_searches: account.free_searches,
            max_emails_per_check: max_per_call,
            user_id: account.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn setup(balance_cents: i64, free: i64) -> (CreditLedger, Uuid) {
        let repo = Arc::new(DuckDbRepository::in_memory(2).unwrap());
        repo.ensure_schema().unwrap();
        let account = Account::new("h", from_cents(balance_cents), free);
        repo.create_account(&account).unwrap();
        (CreditLedger::new(repo), account.id)
    }

    fn search_op() -> MeteredOperation {
        MeteredOperation {
            name: "search",
            cost: Decimal::new(50, 2),
            uses_free_allowance: true,
        }
    }

    fn email_op() -> MeteredOperation {
        MeteredOperation {
            name: "email_validation",
            cost: Decimal::new(10, 2),
            uses_free_allowance: false,
        }
    }

    #[test]
    fn test_free_before_paid() {
        let (ledger, id) = setup(100, 2);

        let first = ledger.debit(id, &search_op()).unwrap();
        assert_eq!(first.source, CreditSource::Free);
        assert_eq!(first.free_searches, 1);
        assert_eq!(first.balance, Decimal::new(100, 2));

        let second = ledger.debit(id, &search_op()).unwrap();
        assert_eq!(second.source, CreditSource::Free);
        assert_eq!(second.free_searches, 0);

        let third = ledger.debit(id, &search_op()).unwrap();
        assert_eq!(third.source, CreditSource::Paid);
        assert_eq!(third.charged, Decimal::new(50, 2));
        assert_eq!(third.balance, Decimal::new(50, 2));
        assert_eq!(third.charge_label(), "0.50");
    }

    #[test]
    fn test_paid_only_operation_skips_free_allowance() {
        let (ledger, id) = setup(100, 5);
        let receipt = ledger.debit(id, &email_op()).unwrap();
        assert_eq!(receipt.source, CreditSource::Paid);
        assert_eq!(receipt.free_searches, 5);
        assert_eq!(receipt.balance, Decimal::new(90, 2));
    }

    #[test]
    fn test_insufficient_credit_reports_state() {
        let (ledger, id) = setup(49, 0);
        match ledger.debit(id, &search_op()) {
            Err(Error::InsufficientCredit {
                balance,
                free_searches,
            }) => {
                assert_eq!(balance, Decimal::new(49, 2));
                assert_eq!(free_searches, 0);
            }
            other => panic!("expected InsufficientCredit, got {:?}", other),
        }
        // Nothing was taken
        assert_eq!(ledger.account(id).unwrap().balance, Decimal::new(49, 2));
    }

    #[test]
    fn test_exact_balance_is_enough() {
        let (ledger, id) = setup(50, 0);
        let receipt = ledger.debit(id, &search_op()).unwrap();
        assert_eq!(receipt.balance, Decimal::ZERO);
        assert!(ledger.debit(id, &search_op()).is_err());
    }

    #[test]
    fn test_unknown_account_is_unauthenticated() {
        let (ledger, _) = setup(100, 1);
        let err = ledger.debit(Uuid::new_v4(), &search_op()).unwrap_err();
        assert!(matches!(err, Error::Unauthenticated(_)));
    }

    #[test]
    fn test_price() {
        let (ledger, id) = setup(1234, 3);
        let price = ledger.price(id, &email_op(), 50).unwrap();
        assert_eq!(price.price, "0.10");
        assert_eq!(price.user_balance, "12.34");
        assert_eq!(price.currency, "USD");
        assert_eq!(price.free_searches, 3);

        let json = serde_json::to_value(&price).unwrap();
        assert_eq!(json["maxEmailsPerCheck"], 50);
        assert_eq!(json["userId"], id.to_string());
    }
}
