//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod accounts;
pub mod export;
pub mod insert;
mod ledger;
pub mod logging;
pub mod migration;
pub mod search;
pub mod validation;
mod validation_cache;

pub use accounts::{AccountService, ProvisionedAccount};
pub use export::{format_message, ExportInfo, ExportResponse, ExportService, NotifyResponse};
pub use insert::{
    BatchInsertRequest, BatchInsertResponse, InsertRequest, InsertResponse, InsertService,
};
pub use ledger::{CreditLedger, PriceResponse};
pub use logging::{EntryPoint, LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use search::{SearchResponse, SearchService, SignalSearchResponse};
pub use validation::{BatchValidationResponse, EmailValidationResponse, ValidationService};
pub use validation_cache::ValidationCache;
