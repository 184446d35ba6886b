//! Identity record domain model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::criteria::is_zip5;

/// Provenance tag used when an insertion does not name one
pub const DEFAULT_SOURCE: &str = "parsec";

/// A stored identity record. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub middle_names: Option<String>,
    pub aka: Option<String>,
    pub dob: Option<NaiveDate>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub county: Option<String>,
    /// Two-letter state code, upper-case
    pub state: Option<String>,
    pub zip: String,
    pub phone: Option<String>,
    /// Nine digits, no separators
    pub ssn: Option<String>,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

/// Raw insertion payload as received from a client
///
/// Every field is optional here so that a malformed record produces
/// validation messages instead of a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewIdentity {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub middle_names: Option<String>,
    #[serde(default)]
    pub aka: Option<String>,
    #[serde(default)]
    pub dob: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub county: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub ssn: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

/// A validated, normalized identity ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct ValidIdentity {
    pub first_name: String,
    pub last_name: String,
    pub middle_names: Option<String>,
    pub aka: Option<String>,
    pub dob: Option<NaiveDate>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub county: Option<String>,
    pub state: Option<String>,
    pub zip: String,
    pub phone: Option<String>,
    pub ssn: Option<String>,
    pub source: String,
}

impl NewIdentity {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        zip: impl Into<String>,
    ) -> Self {
        Self {
            first_name: Some(first_name.into()),
            last_name: Some(last_name.into()),
            zip: Some(zip.into()),
            ..Default::default()
        }
    }

    /// Validate and normalize. Returns every validation message at once.
    pub fn validate(&self) -> Result<ValidIdentity, Vec<String>> {
        let mut errors = Vec::new();

        let first_name = upper(&self.first_name);
        if first_name.is_none() {
            errors.push("first_name is required".to_string());
        }

        let last_name = upper(&self.last_name);
        if last_name.is_none() {
            errors.push("last_name is required".to_string());
        }

        let zip = trimmed(&self.zip).filter(|z| is_zip5(z));
        if zip.is_none() {
            errors.push("zip must be a valid 5-digit ZIP code".to_string());
        }

        let dob = match trimmed(&self.dob) {
            None => None,
            Some(raw) => match parse_dob(&raw) {
                Some(date) => Some(date),
                None => {
                    errors.push("dob must be in format YYYY-MM-DD".to_string());
                    None
                }
            },
        };

        let state = upper(&self.state);
        if let Some(s) = &state {
            if s.len() != 2 || !s.bytes().all(|b| b.is_ascii_alphabetic()) {
                errors.push("state must be a 2-letter code".to_string());
            }
        }

        let ssn = trimmed(&self.ssn).map(|s| s.replace(['-', ' '], ""));
        if let Some(s) = &ssn {
            if s.len() != 9 || !s.bytes().all(|b| b.is_ascii_digit()) {
                errors.push("ssn must contain 9 digits".to_string());
            }
        }

        match (first_name, last_name, zip) {
            (Some(first_name), Some(last_name), Some(zip)) if errors.is_empty() => {
                Ok(ValidIdentity {
                    first_name,
                    last_name,
                    middle_names: upper(&self.middle_names),
                    aka: upper(&self.aka),
                    dob,
                    address: trimmed(&self.address),
                    city: trimmed(&self.city),
                    county: trimmed(&self.county),
                    state,
                    zip,
                    phone: trimmed(&self.phone),
                    ssn,
                    source: trimmed(&self.source).unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
                })
            }
            _ => Err(errors),
        }
    }
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn upper(value: &Option<String>) -> Option<String> {
    trimmed(value).map(|s| s.to_uppercase())
}

/// Strict `YYYY-MM-DD` that is also a real calendar date
fn parse_dob(raw: &str) -> Option<NaiveDate> {
    let shape_ok = raw.len() == 10
        && raw
            .bytes()
            .enumerate()
            .all(|(i, b)| if i == 4 || i == 7 { b == b'-' } else { b.is_ascii_digit() });
    if !shape_ok {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}
