//! Search service - parse, charge, run, format
//!
//! The criteria string is parsed before anything is charged, so a bad
//! query costs nothing. Once the debit succeeds, a failure in the store is
//! surfaced to the caller and recorded as a reconciliation candidate.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::adapters::duckdb::DuckDbRepository;
use crate::adapters::query_plan;
use crate::domain::correlation::flag_matches;
use crate::domain::result::Result;
use crate::domain::{
    format_record, CreditSource, DebitReceipt, IdentityRecord, MeteredOperation, RequestMeta,
    ResultTuple, SearchCriteria, Signal,
};
use crate::services::{CreditLedger, LoggingService};

/// Search response DTO
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub success: bool,
    pub count: usize,
    pub results: Vec<ResultTuple>,
    /// True when the row count reached the cap, so more rows may exist
    pub truncated: bool,
    pub query: String,
    pub parsed: SearchCriteria,
    pub used_paid_balance: bool,
    pub remaining_paid_balance: String,
    pub remaining_free_searches: i64,
}

/// Search response for a signal, with address correlation flags
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalSearchResponse {
    #[serde(flatten)]
    pub search: SearchResponse,
    /// One flag per result: does its street address correlate with an
    /// address seen on the source page
    pub address_matches: Vec<bool>,
}

pub struct SearchService {
    repository: Arc<DuckDbRepository>,
    ledger: Arc<CreditLedger>,
    logging: Arc<LoggingService>,
    operation: MeteredOperation,
    result_cap: usize,
}

impl SearchService {
    pub fn new(
        repository: Arc<DuckDbRepository>,
        ledger: Arc<CreditLedger>,
        logging: Arc<LoggingService>,
        operation: MeteredOperation,
        result_cap: usize,
    ) -> Self {
        Self {
            repository,
            ledger,
            logging,
            operation,
            result_cap: result_cap.max(1),
        }
    }

    /// Run a criteria-string search for `account_id`
    pub fn search(
        &self,
        account_id: Uuid,
        query: &str,
        meta: &RequestMeta,
    ) -> Result<SearchResponse> {
        let criteria = SearchCriteria::parse(query)?;
        let (records, receipt) = self.run(account_id, &criteria)?;
        Ok(self.respond(account_id, query, criteria, &records, &receipt, meta))
    }

    /// Search using the names and zips carried by an upstream signal
    pub fn search_signal(
        &self,
        account_id: Uuid,
        signal: &Signal,
        meta: &RequestMeta,
    ) -> Result<SignalSearchResponse> {
        let criteria = signal.criteria()?;
        let query = criteria.to_query_string();
        let (records, receipt) = self.run(account_id, &criteria)?;

        let sources = signal.source_addresses();
        let candidates: Vec<&str> = records
            .iter()
            .map(|r| r.address.as_deref().unwrap_or(""))
            .collect();
        let address_matches = flag_matches(&candidates, &sources);

        let search = self.respond(account_id, &query, criteria, &records, &receipt, meta);
        Ok(SignalSearchResponse {
            search,
            address_matches,
        })
    }

    fn run(
        &self,
        account_id: Uuid,
        criteria: &SearchCriteria,
    ) -> Result<(Vec<IdentityRecord>, DebitReceipt)> {
        let receipt = self.ledger.debit(account_id, &self.operation)?;

        let plan = query_plan::plan(criteria, self.result_cap);
        match self.repository.search_identities(&plan) {
            Ok(records) => Ok((records, receipt)),
            Err(e) => {
                self.logging.log_reconciliation_candidate(
                    account_id,
                    self.operation.name,
                    &receipt.charge_label(),
                    &e,
                );
                Err(e)
            }
        }
    }

    fn respond(
        &self,
        account_id: Uuid,
        query: &str,
        criteria: SearchCriteria,
        records: &[IdentityRecord],
        receipt: &DebitReceipt,
        meta: &RequestMeta,
    ) -> SearchResponse {
        let results: Vec<ResultTuple> = records.iter().map(format_record).collect();
        let count = results.len();

        if let Err(e) = self.repository.append_search_log(
            account_id,
            query,
            count as i64,
            receipt.source,
            meta,
        ) {
            warn!(%account_id, "failed to record search log: {}", e);
        }

        info!(
            %account_id,
            count,
            source = receipt.source.as_str(),
            "search completed"
        );

        SearchResponse {
            success: true,
            count,
            truncated: count == self.result_cap,
            results,
            query: query.to_string(),
            parsed: criteria,
            used_paid_balance: receipt.source == CreditSource::Paid,
            remaining_paid_balance: format!("{:.2}", receipt.balance),
            remaining_free_searches: receipt.free_searches,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{from_cents, Account, NewIdentity, PostalAddress};
    use crate::services::logging::EntryPoint;
    use rust_decimal::Decimal;

    struct Fixture {
        service: SearchService,
        repo: Arc<DuckDbRepository>,
        account_id: Uuid,
    }

    fn fixture(balance_cents: i64, free: i64, cap: usize) -> Fixture {
        let repo = Arc::new(DuckDbRepository::in_memory(2).unwrap());
        repo.ensure_schema().unwrap();
        let account = Account::new("h", from_cents(balance_cents), free);
        repo.create_account(&account).unwrap();

        let ledger = Arc::new(CreditLedger::new(Arc::clone(&repo)));
        let logging = Arc::new(LoggingService::in_memory(EntryPoint::Cli, "test").unwrap());
        let operation = MeteredOperation {
            name: "search",
            cost: Decimal::new(50, 2),
            uses_free_allowance: true,
        };
        Fixture {
            service: SearchService::new(Arc::clone(&repo), ledger, logging, operation, cap),
            repo,
            account_id: account.id,
        }
    }

    fn insert(repo: &DuckDbRepository, first: &str, last: &str, zip: &str, address: &str) {
        let mut person = NewIdentity::new(first, last, zip);
        person.address = Some(address.into());
        repo.insert_identity(&person.validate().unwrap()).unwrap();
    }

    #[test]
    fn test_search_matches_and_charges() {
        let f = fixture(100, 1, 100);
        insert(&f.repo, "John", "Doe", "30305", "1 Main St");
        insert(&f.repo, "Johnny", "Doe", "30305", "2 Main St");
        insert(&f.repo, "Jane", "Doe", "30305", "3 Main St");

        let resp = f
            .service
            .search(f.account_id, "John.Doe.30305", &RequestMeta::default())
            .unwrap();
        assert_eq!(resp.count, 2);
        assert!(!resp.used_paid_balance);
        assert_eq!(resp.remaining_free_searches, 0);
        assert_eq!(resp.remaining_paid_balance, "1.00");
        assert!(!resp.truncated);

        let resp = f
            .service
            .search(f.account_id, "Jane", &RequestMeta::default())
            .unwrap();
        assert_eq!(resp.count, 1);
        assert!(resp.used_paid_balance);
        assert_eq!(resp.remaining_paid_balance, "0.50");

        let logs = f.repo.get_search_logs(f.account_id, 10).unwrap();
        assert_eq!(logs.len(), 2);
    }

    #[test]
    fn test_bad_query_is_not_charged() {
        let f = fixture(100, 1, 100);
        assert!(f
            .service
            .search(f.account_id, " . . ", &RequestMeta::default())
            .is_err());
        let account = f.repo.get_account(f.account_id).unwrap().unwrap();
        assert_eq!(account.free_searches, 1);
        assert_eq!(account.balance, Decimal::new(100, 2));
    }

    #[test]
    fn test_truncated_at_cap() {
        let f = fixture(0, 5, 2);
        for i in 0..3 {
            insert(&f.repo, "Ann", "Lee", "27006", &format!("{} Oak Ave", i + 1));
        }
        let resp = f
            .service
            .search(f.account_id, "Ann.Lee", &RequestMeta::default())
            .unwrap();
        assert_eq!(resp.count, 2);
        assert!(resp.truncated);
    }

    #[test]
    fn test_search_signal_flags_addresses() {
        let f = fixture(0, 5, 100);
        insert(&f.repo, "Ann", "Lee", "27006", "107 Old Dutch Rd");
        insert(&f.repo, "Ann", "Lee", "27006", "55 Elm St");

        let signal = Signal {
            full_name: "Ann Lee".into(),
            current_address: Some(PostalAddress {
                street: "107 Old Dutch Road".into(),
                city: "Advance".into(),
                state: "NC".into(),
                zip: "27006".into(),
            }),
            ..Default::default()
        };

        let resp = f
            .service
            .search_signal(f.account_id, &signal, &RequestMeta::default())
            .unwrap();
        assert_eq!(resp.search.count, 2);
        assert_eq!(resp.search.query, "ANN.LEE.27006");
        assert_eq!(resp.address_matches, vec![true, false]);

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["addressMatches"][0], true);
        assert_eq!(json["count"], 2);
    }
}
