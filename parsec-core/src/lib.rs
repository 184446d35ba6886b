//! Parsec Core - identity search, credit metering and email validation
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core types and pure heuristics (criteria, identities, accounts, signals)
//! - **ports**: Trait definitions for external dependencies (Notifier, Authenticator)
//! - **services**: Business logic orchestration
//! - **adapters**: Concrete implementations (DuckDB, Telegram, bearer tokens)

pub mod domain;
pub mod ports;
pub mod services;
pub mod adapters;
pub mod config;
pub mod migrations;
pub mod log_migrations;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use adapters::duckdb::DuckDbRepository;
use adapters::telegram::{NullNotifier, TelegramNotifier};
use adapters::token_auth::TokenAuthenticator;
use config::Config;
use ports::Notifier;
use services::*;

// Re-export commonly used types at crate root
pub use domain::{
    Account, CreditSource, DebitReceipt, EmailVerdict, ExportRecord, IdentityRecord,
    NewIdentity, RequestMeta, ResultTuple, SearchCriteria, Signal, ValidationStatus,
};
pub use domain::result::{Error, ErrorBody};
pub use ports::Authenticator;
pub use services::{EntryPoint, LogEvent, LoggingService};

/// Main context for Parsec operations
///
/// This is the primary entry point for all business logic. It holds
/// the database pool, configuration, and all services.
pub struct ParsecContext {
    pub config: Config,
    pub repository: Arc<DuckDbRepository>,
    pub logging: Arc<LoggingService>,
    pub authenticator: TokenAuthenticator,
    pub ledger: Arc<CreditLedger>,
    pub search_service: SearchService,
    pub validation_service: ValidationService,
    pub insert_service: InsertService,
    pub export_service: ExportService,
    pub account_service: AccountService,
}

impl ParsecContext {
    /// Create a context rooted at `parsec_dir` (settings.json, parsec.duckdb, logs.duckdb)
    pub fn new(parsec_dir: &Path, entry_point: EntryPoint) -> Result<Self> {
        let config = Config::load(parsec_dir).context("failed to load settings")?;

        let db_path = parsec_dir.join("parsec.duckdb");
        let repository = Arc::new(
            DuckDbRepository::new(&db_path, config.pool_size)
                .with_context(|| format!("failed to open {}", db_path.display()))?,
        );
        repository.ensure_schema().context("failed to migrate database")?;

        let logging = Arc::new(
            LoggingService::new(parsec_dir, entry_point, env!("CARGO_PKG_VERSION"))
                .context("failed to open log database")?,
        );

        let notifier: Arc<dyn Notifier> = match (&config.telegram_bot_token, &config.telegram_chat_id) {
            (Some(token), Some(chat_id)) => Arc::new(TelegramNotifier::new(token, chat_id)?),
            _ => Arc::new(NullNotifier),
        };

        Ok(Self::assemble(config, repository, logging, notifier))
    }

    /// Fully in-memory context with the given notifier (tests and dry runs)
    pub fn in_memory(config: Config, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let repository = Arc::new(DuckDbRepository::in_memory(config.pool_size)?);
        repository.ensure_schema()?;
        let logging = Arc::new(LoggingService::in_memory(
            EntryPoint::Api,
            env!("CARGO_PKG_VERSION"),
        )?);
        Ok(Self::assemble(config, repository, logging, notifier))
    }

    fn assemble(
        config: Config,
        repository: Arc<DuckDbRepository>,
        logging: Arc<LoggingService>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let ledger = Arc::new(CreditLedger::new(Arc::clone(&repository)));

        let search_service = SearchService::new(
            Arc::clone(&repository),
            Arc::clone(&ledger),
            Arc::clone(&logging),
            config.search_operation(),
            config.result_cap,
        );
        let validation_service = ValidationService::new(
            Arc::clone(&ledger),
            ValidationCache::new(Arc::clone(&repository), config.cache_ttl_days),
            config.email_operation(),
            config.max_emails_per_check,
        );
        let insert_service = InsertService::new(Arc::clone(&repository), config.max_batch_insert);
        let export_service =
            ExportService::new(Arc::clone(&repository), notifier, Arc::clone(&logging));
        let account_service =
            AccountService::new(Arc::clone(&repository), config.default_free_searches);
        let authenticator = TokenAuthenticator::new(Arc::clone(&repository));

        Self {
            config,
            repository,
            logging,
            authenticator,
            ledger,
            search_service,
            validation_service,
            insert_service,
            export_service,
            account_service,
        }
    }

    /// Resolve a bearer token to an account id
    pub fn authenticate(&self, token: &str) -> std::result::Result<uuid::Uuid, Error> {
        self.authenticator.authenticate(token)
    }

    /// Price of one email validation for the account
    pub fn price(&self, account_id: uuid::Uuid) -> std::result::Result<PriceResponse, Error> {
        self.ledger.price(
            account_id,
            &self.config.email_operation(),
            self.config.max_emails_per_check,
        )
    }
}
