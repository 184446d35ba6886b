//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod account;
mod clock;
pub mod correlation;
mod criteria;
pub mod email;
mod export;
mod identity;
pub mod result;
mod search_log;
mod signal;
pub mod tuple;

pub use account::{from_cents, to_cents, Account, CreditSource, DebitReceipt, MeteredOperation};
pub use clock::now_ms;
pub use criteria::{is_zip5, SearchCriteria};
pub use email::{EmailVerdict, ValidationCacheEntry, ValidationStatus};
pub use export::{ExportRecord, NOTIFIER_LOCATION};
pub use identity::{IdentityRecord, NewIdentity, ValidIdentity, DEFAULT_SOURCE};
pub use search_log::{RequestMeta, SearchLogEntry};
pub use signal::{split_full_name, NameParts, PostalAddress, Signal};
pub use tuple::{format_record, ExportRow, ResultTuple, TUPLE_LEN};
