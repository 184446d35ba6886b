//! Authenticator port
//!
//! Capability check at the edge of the core: resolves an opaque bearer
//! token to the account it belongs to. Token issuance and transport are
//! not the core's concern.

use uuid::Uuid;

use crate::domain::result::Result;

pub trait Authenticator: Send + Sync {
    /// Resolve a token to an account id, or `Error::Unauthenticated`
    fn authenticate(&self, token: &str) -> Result<Uuid>;
}
