//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The core domain
//! depends only on these traits, not on concrete implementations.

mod authenticator;
mod notifier;

pub use authenticator::Authenticator;
pub use notifier::Notifier;
