//! DuckDB repository implementation

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use duckdb::types::Type;
use duckdb::{params, params_from_iter, Connection};
use sqlparser::dialect::DuckDbDialect;
use sqlparser::parser::Parser;
use uuid::Uuid;

use crate::adapters::query_plan::{QueryPlan, IDENTITY_COLUMNS};
use crate::domain::result::{Error, Result};
use crate::domain::{
    Account, CreditSource, EmailVerdict, ExportRecord, IdentityRecord, RequestMeta,
    SearchLogEntry, ValidIdentity, ValidationCacheEntry, ValidationStatus,
};
use crate::services::MigrationService;

/// Validate SQL syntax before execution to catch malformed statements early
fn validate_sql_syntax(sql: &str) -> std::result::Result<(), String> {
    let dialect = DuckDbDialect {};
    Parser::parse_sql(&dialect, sql).map_err(|e| {
        let msg = e.to_string();
        msg.trim_start_matches("sql parser error: ").to_string()
    })?;
    Ok(())
}

/// Maximum number of attempts when the database is locked or a write conflicts
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

/// Concurrent transactions touching the same row abort with a conflict
/// instead of blocking. A guarded update that aborted changed nothing, so
/// it can simply run again.
fn is_conflict_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    lower.contains("conflict") || is_retryable_error(&lower)
}

fn retry_delay(attempt: u32) -> Duration {
    Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt))
}

/// DuckDB repository
///
/// Holds a small pool of connections to one database instance. Every
/// operation checks out a single connection, so one request's store access
/// never waits on a lock held by an unrelated request.
pub struct DuckDbRepository {
    pool: Vec<Mutex<Connection>>,
    next: AtomicUsize,
    /// Held for the duration of every ledger debit. DuckDB aborts
    /// concurrent writers to the same row instead of queueing them, so
    /// debits run one at a time.
    debit_lock: Mutex<()>,
}

impl DuckDbRepository {
    /// Open (or create) the database file
    ///
    /// Includes retry logic with exponential backoff for file locking
    /// errors, which occur when another process holds the file briefly.
    pub fn new(db_path: &Path, pool_size: usize) -> Result<Self> {
        let mut attempt = 0;
        loop {
            match Self::try_open_connection(db_path) {
                Ok(conn) => return Self::with_pool(conn, pool_size),
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay = retry_delay(attempt);
                        tracing::warn!(
                            "database busy, retrying in {}ms (attempt {}/{}): {}",
                            delay.as_millis(),
                            attempt + 1,
                            MAX_RETRIES,
                            err_msg
                        );
                        thread::sleep(delay);
                        attempt += 1;
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }
    }

    /// In-memory database (tests and dry runs)
    pub fn in_memory(pool_size: usize) -> Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_in_memory_with_flags(config)?;
        Self::with_pool(conn, pool_size)
    }

    fn try_open_connection(db_path: &Path) -> duckdb::Result<Connection> {
        // Extension autoloading stays off; nothing here needs extensions
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Connection::open_with_flags(db_path, config)
    }

    fn with_pool(first: Connection, pool_size: usize) -> Result<Self> {
        let mut pool = Vec::with_capacity(pool_size.max(1));
        for _ in 1..pool_size.max(1) {
            pool.push(Mutex::new(first.try_clone()?));
        }
        pool.insert(0, Mutex::new(first));
        Ok(Self {
            pool,
            next: AtomicUsize::new(0),
            debit_lock: Mutex::new(()),
        })
    }

    /// Check out a connection, preferring an idle one
    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        let n = self.pool.len();
        let start = self.next.fetch_add(1, Ordering::Relaxed) % n;
        for offset in 0..n {
            if let Ok(guard) = self.pool[(start + offset) % n].try_lock() {
                return Ok(guard);
            }
        }
        self.pool[start]
            .lock()
            .map_err(|e| Error::storage(format!("Lock poisoned: {}", e)))
    }

    /// Run a single-statement write, retrying on write-write conflicts
    fn with_conflict_retry<T>(
        &self,
        op: impl Fn(&Connection) -> duckdb::Result<T>,
    ) -> Result<T> {
        let mut attempt = 0;
        loop {
            let result = {
                let conn = self.conn()?;
                op(&conn)
            };
            match result {
                Ok(value) => return Ok(value),
                Err(e) if is_conflict_error(&e.to_string()) && attempt < MAX_RETRIES - 1 => {
                    let delay = retry_delay(attempt);
                    tracing::debug!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "write conflict, retrying: {}",
                        e
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Run a guarded debit while holding the ledger lock
    fn serialized_debit<T>(&self, op: impl Fn(&Connection) -> duckdb::Result<T>) -> Result<T> {
        // Guards no data, so a poisoned lock is still usable
        let _guard = self
            .debit_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.with_conflict_retry(op)
    }

    /// Run pending migrations
    pub fn run_migrations(&self) -> Result<crate::services::MigrationResult> {
        let conn = self.conn()?;
        MigrationService::new(&conn).run_pending()
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    /// Run raw maintenance statements after a syntax check
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        validate_sql_syntax(sql).map_err(Error::Storage)?;
        let conn = self.conn()?;
        conn.execute_batch(sql)?;
        Ok(())
    }

    // === Identity operations ===

    /// Insert a validated identity, returning its assigned id
    pub fn insert_identity(&self, identity: &ValidIdentity) -> Result<i64> {
        let conn = self.conn()?;
        let id: i64 = conn.query_row(
            "INSERT INTO identities (first_name, last_name, middle_names, aka, dob, address,
                                     city, county, state, zip, phone, ssn, source, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
            params![
                identity.first_name,
                identity.last_name,
                identity.middle_names,
                identity.aka,
                identity.dob.map(|d| d.format("%Y-%m-%d").to_string()),
                identity.address,
                identity.city,
                identity.county,
                identity.state,
                identity.zip,
                identity.phone,
                identity.ssn,
                identity.source,
                format_timestamp(&Utc::now()),
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Whether a record with the same (case-insensitive) name and zip exists
    pub fn identity_exists(&self, first_name: &str, last_name: &str, zip: &str) -> Result<bool> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM identities
             WHERE upper(first_name) = upper(?) AND upper(last_name) = upper(?) AND zip = ?",
            params![first_name, last_name, zip],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn get_identity(&self, id: i64) -> Result<Option<IdentityRecord>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM identities WHERE id = ?", IDENTITY_COLUMNS);
        match conn.query_row(&sql, params![id], row_to_identity) {
            Ok(record) => Ok(Some(record)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn count_identities(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM identities", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Execute a planned lookup. Every failure is a `QueryExecution` error.
    pub fn search_identities(&self, plan: &QueryPlan) -> Result<Vec<IdentityRecord>> {
        validate_sql_syntax(&plan.sql).map_err(Error::QueryExecution)?;

        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&plan.sql)
            .map_err(|e| Error::QueryExecution(e.to_string()))?;
        let records = stmt
            .query_map(params_from_iter(plan.params.iter()), row_to_identity)
            .map_err(|e| Error::QueryExecution(e.to_string()))?
            .collect::<duckdb::Result<Vec<_>>>()
            .map_err(|e| Error::QueryExecution(e.to_string()))?;
        Ok(records)
    }

    // === Account operations ===

    pub fn create_account(&self, account: &Account) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO accounts (account_id, auth_identity, label, balance_cents, free_searches,
                                   created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                account.id.to_string(),
                account.auth_identity,
                account.label,
                crate::domain::to_cents(account.balance),
                account.free_searches,
                format_timestamp(&account.created_at),
                format_timestamp(&account.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_account(&self, account_id: Uuid) -> Result<Option<Account>> {
        self.query_account("account_id", &account_id.to_string())
    }

    pub fn get_account_by_auth_identity(&self, auth_identity: &str) -> Result<Option<Account>> {
        self.query_account("auth_identity", auth_identity)
    }

    fn query_account(&self, column: &str, value: &str) -> Result<Option<Account>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT account_id, auth_identity, label, balance_cents, free_searches,
                    created_at::VARCHAR, updated_at::VARCHAR
             FROM accounts WHERE {} = ?",
            column
        );
        match conn.query_row(&sql, params![value], row_to_account) {
            Ok(account) => Ok(Some(account)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_accounts(&self) -> Result<Vec<Account>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT account_id, auth_identity, label, balance_cents, free_searches,
                    created_at::VARCHAR, updated_at::VARCHAR
             FROM accounts ORDER BY created_at",
        )?;
        let accounts = stmt
            .query_map([], row_to_account)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(accounts)
    }

    /// Consume one free search if any remain
    ///
    /// Returns `(balance_cents, free_searches)` after the update, or `None`
    /// when the guard did not match (no free searches or no such account).
    pub fn debit_free(&self, account_id: Uuid) -> Result<Option<(i64, i64)>> {
        let id = account_id.to_string();
        self.serialized_debit(|conn| {
            let now = format_timestamp(&Utc::now());
            match conn.query_row(
                "UPDATE accounts
                 SET free_searches = free_searches - 1, updated_at = ?
                 WHERE account_id = ? AND free_searches > 0
                 RETURNING balance_cents, free_searches",
                params![now, id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            ) {
                Ok(after) => Ok(Some(after)),
                Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
    }

    /// Subtract `cost_cents` from the paid balance if it covers the cost
    ///
    /// Same return contract as [`DuckDbRepository::debit_free`].
    pub fn debit_paid(&self, account_id: Uuid, cost_cents: i64) -> Result<Option<(i64, i64)>> {
        let id = account_id.to_string();
        self.serialized_debit(|conn| {
            let now = format_timestamp(&Utc::now());
            match conn.query_row(
                "UPDATE accounts
                 SET balance_cents = balance_cents - ?, updated_at = ?
                 WHERE account_id = ? AND balance_cents >= ?
                 RETURNING balance_cents, free_searches",
                params![cost_cents, now, id, cost_cents],
                |row| Ok((row.get(0)?, row.get(1)?)),
            ) {
                Ok(after) => Ok(Some(after)),
                Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
    }

    // === Validation cache ===

    pub fn get_cache_entry(&self, email: &str) -> Result<Option<ValidationCacheEntry>> {
        let conn = self.conn()?;
        match conn.query_row(
            "SELECT email, valid, status, disposable, role_based, free_domain, catch_all,
                    expires_at_ms, created_at_ms
             FROM email_cache WHERE email = ?",
            params![email],
            |row| {
                let status: String = row.get(2)?;
                Ok(ValidationCacheEntry {
                    verdict: EmailVerdict {
                        email: row.get(0)?,
                        valid: row.get(1)?,
                        status: ValidationStatus::parse(&status),
                        disposable: row.get(3)?,
                        role_based: row.get(4)?,
                        free_domain: row.get(5)?,
                        catch_all: row.get(6)?,
                    },
                    expires_at_ms: row.get(7)?,
                    created_at_ms: row.get(8)?,
                })
            },
        ) {
            Ok(entry) => Ok(Some(entry)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Insert or overwrite the entry for the verdict's email
    pub fn upsert_cache_entry(&self, entry: &ValidationCacheEntry) -> Result<()> {
        let v = &entry.verdict;
        self.with_conflict_retry(|conn| {
            conn.execute(
                "INSERT INTO email_cache (email, valid, status, disposable, role_based, free_domain,
                                          catch_all, expires_at_ms, created_at_ms)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (email) DO UPDATE SET
                    valid = EXCLUDED.valid,
                    status = EXCLUDED.status,
                    disposable = EXCLUDED.disposable,
                    role_based = EXCLUDED.role_based,
                    free_domain = EXCLUDED.free_domain,
                    catch_all = EXCLUDED.catch_all,
                    expires_at_ms = EXCLUDED.expires_at_ms,
                    created_at_ms = EXCLUDED.created_at_ms",
                params![
                    v.email,
                    v.valid,
                    v.status.as_str(),
                    v.disposable,
                    v.role_based,
                    v.free_domain,
                    v.catch_all,
                    entry.expires_at_ms,
                    entry.created_at_ms,
                ],
            )
        })?;
        Ok(())
    }

    // === Search audit ===

    pub fn append_search_log(
        &self,
        account_id: Uuid,
        query: &str,
        result_count: i64,
        source: CreditSource,
        meta: &RequestMeta,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO search_logs (account_id, query, result_count, credit_source,
                                      ip_address, user_agent, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                account_id.to_string(),
                query,
                result_count,
                source.as_str(),
                meta.ip_address,
                meta.user_agent,
                format_timestamp(&Utc::now()),
            ],
        )?;
        Ok(())
    }

    /// Most recent searches for an account
    pub fn get_search_logs(&self, account_id: Uuid, limit: usize) -> Result<Vec<SearchLogEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, account_id, query, result_count, credit_source, ip_address, user_agent,
                    created_at::VARCHAR
             FROM search_logs WHERE account_id = ?
             ORDER BY id DESC LIMIT ?",
        )?;
        let entries = stmt
            .query_map(params![account_id.to_string(), limit as i64], |row| {
                let account: String = row.get(1)?;
                let source: String = row.get(4)?;
                let created: String = row.get(7)?;
                Ok(SearchLogEntry {
                    id: row.get(0)?,
                    account_id: parse_uuid(1, &account)?,
                    query: row.get(2)?,
                    result_count: row.get(3)?,
                    credit_source: parse_credit_source(4, &source)?,
                    ip_address: row.get(5)?,
                    user_agent: row.get(6)?,
                    created_at: parse_timestamp(7, &created)?,
                })
            })?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(entries)
    }

    // === Exports ===

    pub fn insert_export(&self, record: &ExportRecord) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO exports (file_id, account_id, query, result_count, location, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                record.file_id,
                record.account_id.to_string(),
                record.query,
                record.result_count,
                record.location,
                format_timestamp(&record.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_export(&self, file_id: &str) -> Result<Option<ExportRecord>> {
        let conn = self.conn()?;
        match conn.query_row(
            "SELECT file_id, account_id, query, result_count, location, created_at::VARCHAR
             FROM exports WHERE file_id = ?",
            params![file_id],
            |row| {
                let account: String = row.get(1)?;
                let created: String = row.get(5)?;
                Ok(ExportRecord {
                    file_id: row.get(0)?,
                    account_id: parse_uuid(1, &account)?,
                    query: row.get(2)?,
                    result_count: row.get(3)?,
                    location: row.get(4)?,
                    created_at: parse_timestamp(5, &created)?,
                })
            },
        ) {
            Ok(record) => Ok(Some(record)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn row_to_identity(row: &duckdb::Row) -> duckdb::Result<IdentityRecord> {
    // Column order: see IDENTITY_COLUMNS
    let dob: Option<String> = row.get(5)?;
    let created: String = row.get(14)?;
    Ok(IdentityRecord {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        middle_names: row.get(3)?,
        aka: row.get(4)?,
        dob: dob
            .map(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| conversion(5, e)))
            .transpose()?,
        address: row.get(6)?,
        city: row.get(7)?,
        county: row.get(8)?,
        state: row.get(9)?,
        zip: row.get(10)?,
        phone: row.get(11)?,
        ssn: row.get(12)?,
        source: row.get(13)?,
        created_at: parse_timestamp(14, &created)?,
    })
}

fn row_to_account(row: &duckdb::Row) -> duckdb::Result<Account> {
    // 0: account_id, 1: auth_identity, 2: label, 3: balance_cents,
    // 4: free_searches, 5: created_at, 6: updated_at
    let id_str: String = row.get(0)?;
    let created: String = row.get(5)?;
    let updated: String = row.get(6)?;
    Ok(Account {
        id: parse_uuid(0, &id_str)?,
        auth_identity: row.get(1)?,
        label: row.get(2)?,
        balance: crate::domain::from_cents(row.get(3)?),
        free_searches: row.get(4)?,
        created_at: parse_timestamp(5, &created)?,
        updated_at: parse_timestamp(6, &updated)?,
    })
}

// Helper functions

/// Timestamps are stored as naive UTC
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.naive_utc().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// A stored value that does not parse is corrupt data, reported as an
/// error on column `idx` rather than replaced
fn conversion(
    idx: usize,
    e: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
) -> duckdb::Error {
    duckdb::Error::FromSqlConversionFailure(idx, Type::Text, e.into())
}

fn parse_uuid(idx: usize, s: &str) -> duckdb::Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| conversion(idx, e))
}

fn parse_credit_source(idx: usize, s: &str) -> duckdb::Result<CreditSource> {
    match s {
        "free" => Ok(CreditSource::Free),
        "paid" => Ok(CreditSource::Paid),
        other => Err(conversion(idx, format!("unknown credit source '{}'", other))),
    }
}

fn parse_timestamp(idx: usize, s: &str) -> duckdb::Result<DateTime<Utc>> {
    parse_naive_datetime(s)
        .map(|dt| dt.and_utc())
        .ok_or_else(|| conversion(idx, format!("unparseable timestamp '{}'", s)))
}

fn parse_naive_datetime(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    // Formats DuckDB produces when casting TIMESTAMP to VARCHAR
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::query_plan::plan;
    use crate::domain::{NewIdentity, SearchCriteria};
    use rust_decimal::Decimal;

    fn repo() -> DuckDbRepository {
        let repo = DuckDbRepository::in_memory(2).unwrap();
        repo.ensure_schema().unwrap();
        repo
    }

    fn insert(repo: &DuckDbRepository, first: &str, last: &str, zip: &str) -> i64 {
        let identity = NewIdentity::new(first, last, zip).validate().unwrap();
        repo.insert_identity(&identity).unwrap()
    }

    // ==================== SQL syntax checks ====================

    #[test]
    fn test_valid_select() {
        assert!(validate_sql_syntax("SELECT * FROM identities").is_ok());
    }

    #[test]
    fn test_planned_statement_is_valid_sql() {
        let c = SearchCriteria::parse("John,Johnny.Doe.30305").unwrap();
        assert!(validate_sql_syntax(&plan(&c, 100).sql).is_ok());
    }

    #[test]
    fn test_missing_table_name() {
        let err = validate_sql_syntax("SELECT * FROM WHERE zip = '30305'").unwrap_err();
        assert!(!err.starts_with("sql parser error"));
    }

    #[test]
    fn test_unclosed_parenthesis() {
        assert!(validate_sql_syntax("SELECT * FROM identities WHERE (zip = '1'").is_err());
    }

    #[test]
    fn test_conflict_errors_are_retryable() {
        assert!(is_conflict_error(
            "TransactionContext Error: Catalog write-write conflict on alter with \"accounts\""
        ));
        assert!(is_conflict_error("Conflict on tuple update!"));
        assert!(!is_conflict_error("Constraint Error: CHECK constraint failed"));
    }

    // ==================== Repository ====================

    #[test]
    fn test_insert_and_get_identity() {
        let repo = repo();
        let mut new = NewIdentity::new("ann", "lee", "27006");
        new.dob = Some("1980-02-29".into());
        let id = repo.insert_identity(&new.validate().unwrap()).unwrap();

        let record = repo.get_identity(id).unwrap().unwrap();
        assert_eq!(record.first_name, "ANN");
        assert_eq!(record.dob, NaiveDate::from_ymd_opt(1980, 2, 29));
        assert_eq!(record.source, "parsec");
        assert!(repo.get_identity(id + 1000).unwrap().is_none());
    }

    #[test]
    fn test_ids_are_sequential() {
        let repo = repo();
        let a = insert(&repo, "A1", "B", "11111");
        let b = insert(&repo, "A2", "B", "11111");
        assert!(b > a);
        assert_eq!(repo.count_identities().unwrap(), 2);
    }

    #[test]
    fn test_search_prefix_and_cap() {
        let repo = repo();
        insert(&repo, "John", "Doe", "30305");
        insert(&repo, "Johnny", "Doe", "30305");
        insert(&repo, "Jonathan", "Doe", "30305");
        insert(&repo, "John", "Doe", "99999");

        let c = SearchCriteria::parse("john.doe.30305").unwrap();
        let rows = repo.search_identities(&plan(&c, 100)).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].id < rows[1].id);

        let capped = repo.search_identities(&plan(&c, 1)).unwrap();
        assert_eq!(capped.len(), 1);
    }

    #[test]
    fn test_identity_exists_is_case_insensitive() {
        let repo = repo();
        insert(&repo, "Mary", "Major", "10001");
        assert!(repo.identity_exists("mary", "MAJOR", "10001").unwrap());
        assert!(!repo.identity_exists("mary", "major", "10002").unwrap());
    }

    #[test]
    fn test_guarded_debits() {
        let repo = repo();
        let account = Account::new("hash", Decimal::new(100, 2), 1);
        repo.create_account(&account).unwrap();

        assert_eq!(repo.debit_free(account.id).unwrap(), Some((100, 0)));
        assert_eq!(repo.debit_free(account.id).unwrap(), None);
        assert_eq!(repo.debit_paid(account.id, 60).unwrap(), Some((40, 0)));
        assert_eq!(repo.debit_paid(account.id, 60).unwrap(), None);
        assert_eq!(repo.debit_paid(Uuid::new_v4(), 1).unwrap(), None);

        let stored = repo.get_account(account.id).unwrap().unwrap();
        assert_eq!(stored.balance, Decimal::new(40, 2));
        assert_eq!(stored.free_searches, 0);
    }

    #[test]
    fn test_account_lookup_by_auth_identity() {
        let repo = repo();
        let account = Account::new("abc123", Decimal::ZERO, 0);
        repo.create_account(&account).unwrap();
        let found = repo.get_account_by_auth_identity("abc123").unwrap().unwrap();
        assert_eq!(found.id, account.id);
        assert!(repo.get_account_by_auth_identity("nope").unwrap().is_none());
        assert_eq!(repo.list_accounts().unwrap().len(), 1);
    }

    #[test]
    fn test_cache_upsert_overwrites() {
        let repo = repo();
        let mut entry = ValidationCacheEntry {
            verdict: crate::domain::email::classify("jane@gmail.com"),
            expires_at_ms: 10,
            created_at_ms: 1,
        };
        repo.upsert_cache_entry(&entry).unwrap();
        entry.expires_at_ms = 20;
        repo.upsert_cache_entry(&entry).unwrap();

        let stored = repo.get_cache_entry("jane@gmail.com").unwrap().unwrap();
        assert_eq!(stored.expires_at_ms, 20);
        assert_eq!(stored.verdict, entry.verdict);
        assert!(repo.get_cache_entry("other@gmail.com").unwrap().is_none());
    }

    #[test]
    fn test_search_log_and_exports() {
        let repo = repo();
        let account_id = Uuid::new_v4();
        let meta = RequestMeta {
            ip_address: Some("10.0.0.1".into()),
            user_agent: None,
        };
        repo.append_search_log(account_id, "JOHN..", 3, CreditSource::Free, &meta)
            .unwrap();
        let logs = repo.get_search_logs(account_id, 10).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].credit_source, CreditSource::Free);
        assert_eq!(logs[0].ip_address.as_deref(), Some("10.0.0.1"));

        let record = ExportRecord::file(account_id, "JOHN..", 3);
        repo.insert_export(&record).unwrap();
        let stored = repo.get_export(&record.file_id).unwrap().unwrap();
        assert_eq!(stored.account_id, account_id);
        assert_eq!(stored.location, record.location);
    }

    #[test]
    fn test_timestamp_round_trip_format() {
        let ts = parse_timestamp(0, "2026-03-01 12:30:45.123456").unwrap();
        assert_eq!(format_timestamp(&ts), "2026-03-01 12:30:45.123456");
        assert!(parse_timestamp(0, "yesterday").is_err());
    }

    #[test]
    fn test_corrupt_account_row_is_an_error() {
        let repo = repo();
        repo.create_account(&Account::new("good", Decimal::ZERO, 0)).unwrap();
        repo.execute_batch(
            "INSERT INTO accounts (account_id, auth_identity, label, balance_cents, free_searches,
                                   created_at, updated_at)
             VALUES ('not-a-uuid', 'bad', NULL, 0, 0, TIMESTAMP '2026-01-01 00:00:00',
                     TIMESTAMP '2026-01-01 00:00:00')",
        )
        .unwrap();

        let err = repo.list_accounts().unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert!(repo.get_account_by_auth_identity("bad").is_err());
    }

    #[test]
    fn test_corrupt_search_log_is_an_error() {
        let repo = repo();
        let account_id = Uuid::new_v4();
        let meta = RequestMeta::default();
        repo.append_search_log(account_id, "A..", 1, CreditSource::Paid, &meta)
            .unwrap();
        repo.execute_batch(&format!(
            "UPDATE search_logs SET credit_source = 'gift' WHERE account_id = '{}'",
            account_id
        ))
        .unwrap();

        assert!(matches!(
            repo.get_search_logs(account_id, 10),
            Err(Error::Storage(_))
        ));
    }

    #[test]
    fn test_debits_on_one_account_do_not_conflict() {
        let repo = std::sync::Arc::new(repo());
        let account = Account::new("busy", Decimal::new(100_000, 2), 0);
        repo.create_account(&account).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let repo = std::sync::Arc::clone(&repo);
                std::thread::spawn(move || {
                    (0..10)
                        .map(|_| repo.debit_paid(account.id, 50))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        for handle in handles {
            for outcome in handle.join().unwrap() {
                assert!(outcome.unwrap().is_some());
            }
        }
        let stored = repo.get_account(account.id).unwrap().unwrap();
        assert_eq!(stored.balance, Decimal::new(100_000 - 80 * 50, 2));
    }
}
