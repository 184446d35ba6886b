//! Account provisioning and inspection
//!
//! Provisioning is the only place an account's balance or free allowance
//! is set directly; afterwards only the credit ledger changes them.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::adapters::duckdb::DuckDbRepository;
use crate::adapters::token_auth::{generate_token, hash_token};
use crate::domain::result::{Error, Result};
use crate::domain::{Account, SearchLogEntry};

/// A new account and its bearer token. The token is shown once; only its
/// digest is stored.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionedAccount {
    pub account: Account,
    pub token: String,
}

pub struct AccountService {
    repository: Arc<DuckDbRepository>,
    default_free_searches: i64,
}

impl AccountService {
    pub fn new(repository: Arc<DuckDbRepository>, default_free_searches: i64) -> Self {
        Self {
            repository,
            default_free_searches,
        }
    }

    pub fn provision(
        &self,
        balance: Decimal,
        free_searches: Option<i64>,
        label: Option<String>,
    ) -> Result<ProvisionedAccount> {
        let token = generate_token();
        let mut account = Account::new(
            hash_token(&token),
            balance.round_dp(2),
            free_searches.unwrap_or(self.default_free_searches),
        );
        account.label = label.filter(|l| !l.trim().is_empty());
        account.validate().map_err(Error::invalid_input)?;

        self.repository.create_account(&account)?;
        info!(account_id = %account.id, "account provisioned");

        Ok(ProvisionedAccount { account, token })
    }

    pub fn show(&self, account_id: Uuid) -> Result<Account> {
        self.repository
            .get_account(account_id)?
            .ok_or_else(|| Error::not_found(format!("account {}", account_id)))
    }

    pub fn list(&self) -> Result<Vec<Account>> {
        self.repository.list_accounts()
    }

    /// Most recent searches, newest first
    pub fn history(&self, account_id: Uuid, limit: usize) -> Result<Vec<SearchLogEntry>> {
        self.repository.get_search_logs(account_id, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::token_auth::TokenAuthenticator;
    use crate::ports::Authenticator;

    fn service() -> (AccountService, Arc<DuckDbRepository>) {
        let repo = Arc::new(DuckDbRepository::in_memory(1).unwrap());
        repo.ensure_schema().unwrap();
        (AccountService::new(Arc::clone(&repo), 3), repo)
    }

    #[test]
    fn test_provision_and_authenticate() {
        let (service, repo) = service();
        let created = service
            .provision(Decimal::new(1000, 2), None, Some("ops".into()))
            .unwrap();
        assert_eq!(created.account.free_searches, 3);
        assert_ne!(created.account.auth_identity, created.token);

        let auth = TokenAuthenticator::new(repo);
        let id = auth.authenticate(&format!("Bearer {}", created.token)).unwrap();
        assert_eq!(id, created.account.id);

        let shown = service.show(id).unwrap();
        assert_eq!(shown.balance, Decimal::new(1000, 2));
        assert_eq!(shown.label.as_deref(), Some("ops"));
    }

    #[test]
    fn test_negative_values_rejected() {
        let (service, _) = service();
        assert!(service.provision(Decimal::new(-1, 0), None, None).is_err());
        assert!(service.provision(Decimal::ZERO, Some(-2), None).is_err());
        assert!(service.list().unwrap().is_empty());
    }

    #[test]
    fn test_show_unknown_account() {
        let (service, _) = service();
        assert_eq!(service.show(Uuid::new_v4()).unwrap_err().status_code(), 404);
        assert!(service.history(Uuid::new_v4(), 10).unwrap().is_empty());
    }
}
