//! Normalized signal emitted by upstream scrape adapters
//!
//! Every adapter, whatever site it reads, produces this one shape. The
//! core never sees page markup.

use serde::{Deserialize, Serialize};

use crate::domain::criteria::SearchCriteria;
use crate::domain::result::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostalAddress {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub full_name: String,
    #[serde(default)]
    pub aka_names: Vec<String>,
    #[serde(default)]
    pub zip_codes: Vec<String>,
    #[serde(default)]
    pub current_address: Option<PostalAddress>,
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub phones: Vec<String>,
    /// Every other street address seen for the subject (previous addresses)
    #[serde(default)]
    pub other_addresses: Vec<String>,
}

/// Given/last name pair derived from a display name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameParts {
    pub given: Option<String>,
    pub last: Option<String>,
}

/// A name token is usable when it has at least two characters and at
/// least one ASCII letter
fn is_valid_name(token: &str) -> bool {
    token.chars().count() >= 2 && token.chars().any(|c| c.is_ascii_alphabetic())
}

/// First usable token is the given name, last usable token (if there is
/// more than one) the surname
pub fn split_full_name(full_name: &str) -> NameParts {
    let parts: Vec<&str> = full_name
        .split_whitespace()
        .filter(|t| is_valid_name(t))
        .collect();

    match parts.as_slice() {
        [] => NameParts::default(),
        [only] => NameParts {
            given: Some(only.to_string()),
            last: None,
        },
        [first, .., last] => NameParts {
            given: Some(first.to_string()),
            last: Some(last.to_string()),
        },
    }
}

impl Signal {
    /// Search criteria covering the primary name and every AKA
    pub fn criteria(&self) -> Result<SearchCriteria> {
        let mut given = Vec::new();
        let mut last = Vec::new();

        for name in std::iter::once(&self.full_name).chain(self.aka_names.iter()) {
            let parts = split_full_name(name);
            given.extend(parts.given);
            last.extend(parts.last);
        }

        let mut zips = self.zip_codes.clone();
        if let Some(addr) = &self.current_address {
            if !zips.contains(&addr.zip) {
                zips.push(addr.zip.clone());
            }
        }

        SearchCriteria::new(given, last, zips)
    }

    /// Street addresses to correlate results against: the current one first
    pub fn source_addresses(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let current = self
            .current_address
            .as_ref()
            .map(|a| a.street.trim().to_string());
        for addr in current.into_iter().chain(self.other_addresses.iter().map(|a| a.trim().to_string())) {
            if !addr.is_empty() && !out.contains(&addr) {
                out.push(addr);
            }
        }
        out
    }
}
