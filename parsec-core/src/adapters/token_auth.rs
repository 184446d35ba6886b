//! Bearer-token authenticator backed by the accounts table
//!
//! Only the SHA-256 hex digest of a token is stored. Tokens are 32 random
//! bytes, URL-safe base64 encoded, with a `psc_` prefix.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::{Error, Result};
use crate::ports::Authenticator;

const TOKEN_PREFIX: &str = "psc_";

/// Generate a fresh opaque bearer token
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}{}", TOKEN_PREFIX, URL_SAFE_NO_PAD.encode(bytes))
}

/// Stored form of a token
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.trim().as_bytes()))
}

pub struct TokenAuthenticator {
    repository: Arc<DuckDbRepository>,
}

impl TokenAuthenticator {
    pub fn new(repository: Arc<DuckDbRepository>) -> Self {
        Self { repository }
    }
}

impl Authenticator for TokenAuthenticator {
    fn authenticate(&self, token: &str) -> Result<Uuid> {
        let token = token.trim();
        let token = token.strip_prefix("Bearer ").unwrap_or(token);
        if token.is_empty() {
            return Err(Error::unauthenticated("missing token"));
        }

        self.repository
            .get_account_by_auth_identity(&hash_token(token))?
            .map(|account| account.id)
            .ok_or_else(|| Error::unauthenticated("invalid token"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Account;
    use rust_decimal::Decimal;

    #[test]
    fn test_token_shape() {
        let a = generate_token();
        let b = generate_token();
        assert!(a.starts_with("psc_"));
        assert_eq!(a.len(), 4 + 43);
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_is_sha256_hex() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(hash_token(" abc "), hash_token("abc"));
    }

    #[test]
    fn test_authenticate() {
        let repo = Arc::new(DuckDbRepository::in_memory(1).unwrap());
        repo.ensure_schema().unwrap();
        let token = generate_token();
        let account = Account::new(hash_token(&token), Decimal::ZERO, 0);
        repo.create_account(&account).unwrap();

        let auth = TokenAuthenticator::new(Arc::clone(&repo));
        assert_eq!(auth.authenticate(&token).unwrap(), account.id);
        assert_eq!(auth.authenticate(&format!("Bearer {}", token)).unwrap(), account.id);

        let err = auth.authenticate("psc_wrong").unwrap_err();
        assert_eq!(err.status_code(), 401);
        assert!(matches!(auth.authenticate("  "), Err(Error::Unauthenticated(_))));
    }
}
