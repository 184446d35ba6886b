//! Email classification heuristic
//!
//! A deterministic stand-in for a real deliverability check. It never
//! touches the network: the verdict is derived from fixed domain and
//! local-part lists.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

const DISPOSABLE_DOMAINS: &[&str] = &[
    "tempmail.com",
    "throwaway.email",
    "10minutemail.com",
    "guerrillamail.com",
    "mailinator.com",
    "temp-mail.org",
];

const ROLE_PREFIXES: &[&str] = &[
    "admin", "info", "support", "help", "sales", "contact", "hello", "noreply", "no-reply",
];

const FREE_DOMAINS: &[&str] = &[
    "gmail.com",
    "yahoo.com",
    "outlook.com",
    "hotmail.com",
    "yandex.com",
    "mail.com",
];

fn email_shape() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"))
}

/// Cache key form of an address: trimmed and lower-cased
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// `local@domain.tld` shape check
pub fn is_valid_syntax(email: &str) -> bool {
    email_shape().is_match(email)
}

/// Status label, ordered by priority (highest first)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ValidationStatus {
    Invalid,
    Disposable,
    #[serde(rename = "Role Based")]
    RoleBased,
    Valid,
    Unknown,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Invalid => "Invalid",
            ValidationStatus::Disposable => "Disposable",
            ValidationStatus::RoleBased => "Role Based",
            ValidationStatus::Valid => "Valid",
            ValidationStatus::Unknown => "Unknown",
        }
    }

    pub fn parse(label: &str) -> Self {
        match label {
            "Invalid" => ValidationStatus::Invalid,
            "Disposable" => ValidationStatus::Disposable,
            "Role Based" => ValidationStatus::RoleBased,
            "Valid" => ValidationStatus::Valid,
            _ => ValidationStatus::Unknown,
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification result for one normalized address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailVerdict {
    pub email: String,
    pub valid: bool,
    pub status: ValidationStatus,
    pub disposable: bool,
    pub role_based: bool,
    pub free_domain: bool,
    /// `None` until a real catch-all SMTP check exists
    pub catch_all: Option<bool>,
}

impl EmailVerdict {
    pub fn reason(&self) -> String {
        if self.valid {
            "Email is valid".to_string()
        } else {
            format!("Email is {}", self.status)
        }
    }
}

/// Classify an already-normalized address
///
/// Addresses that fail the syntax check get `Invalid`; callers are
/// expected to reject those before charging anything.
pub fn classify(email: &str) -> EmailVerdict {
    let (local, domain) = email.split_once('@').unwrap_or((email, ""));
    let local = local.to_lowercase();
    let domain = domain.to_lowercase();
    let free_domain = FREE_DOMAINS.contains(&domain.as_str());

    if !is_valid_syntax(email) {
        return EmailVerdict {
            email: email.to_string(),
            valid: false,
            status: ValidationStatus::Invalid,
            disposable: false,
            role_based: false,
            free_domain,
            catch_all: None,
        };
    }

    let disposable = DISPOSABLE_DOMAINS.contains(&domain.as_str());
    let role_based = ROLE_PREFIXES.iter().any(|p| local.starts_with(p));
    let valid = !disposable && !role_based;

    let status = if disposable {
        ValidationStatus::Disposable
    } else if role_based {
        ValidationStatus::RoleBased
    } else if valid {
        ValidationStatus::Valid
    } else {
        ValidationStatus::Unknown
    };

    EmailVerdict {
        email: email.to_string(),
        valid,
        status,
        disposable,
        role_based,
        free_domain,
        catch_all: None,
    }
}

/// A cached verdict with its expiration horizon (unix ms)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationCacheEntry {
    pub verdict: EmailVerdict,
    pub expires_at_ms: i64,
    pub created_at_ms: i64,
}

impl ValidationCacheEntry {
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_email("  John.Doe@Gmail.COM "), "john.doe@gmail.com");
    }

    #[test]
    fn test_syntax() {
        assert!(is_valid_syntax("a@b.co"));
        assert!(!is_valid_syntax("a@b"));
        assert!(!is_valid_syntax("a b@c.com"));
        assert!(!is_valid_syntax("@c.com"));
        assert!(!is_valid_syntax("a@@c.com"));
    }

    #[test]
    fn test_plain_free_address_is_valid() {
        let v = classify("jane@gmail.com");
        assert!(v.valid);
        assert_eq!(v.status, ValidationStatus::Valid);
        assert!(v.free_domain);
        assert!(!v.disposable);
        assert!(!v.role_based);
        assert_eq!(v.reason(), "Email is valid");
    }

    #[test]
    fn test_disposable_beats_role_based() {
        let v = classify("info@mailinator.com");
        assert!(!v.valid);
        assert!(v.disposable);
        assert!(v.role_based);
        assert_eq!(v.status, ValidationStatus::Disposable);
    }

    #[test]
    fn test_role_prefix_matches_start_of_local_part() {
        let v = classify("support-team@acme.io");
        assert!(v.role_based);
        assert_eq!(v.status, ValidationStatus::RoleBased);
        assert_eq!(v.reason(), "Email is Role Based");
        assert!(!classify("no-reply@acme.io").valid);
    }

    #[test]
    fn test_invalid_shape() {
        let v = classify("not-an-email");
        assert_eq!(v.status, ValidationStatus::Invalid);
        assert!(!v.valid);
    }

    #[test]
    fn test_deterministic_and_catch_all_unknown() {
        let a = classify("someone@outlook.com");
        let b = classify("someone@outlook.com");
        assert_eq!(a, b);
        assert_eq!(a.catch_all, None);
    }

    #[test]
    fn test_cache_entry_expiry_boundary() {
        let entry = ValidationCacheEntry {
            verdict: classify("jane@gmail.com"),
            expires_at_ms: 1_000,
            created_at_ms: 0,
        };
        assert!(!entry.is_expired_at(999));
        assert!(entry.is_expired_at(1_000));
    }

    #[test]
    fn test_status_priority_order() {
        assert!(ValidationStatus::Invalid < ValidationStatus::Disposable);
        assert!(ValidationStatus::Disposable < ValidationStatus::RoleBased);
        assert!(ValidationStatus::RoleBased < ValidationStatus::Valid);
        assert!(ValidationStatus::Valid < ValidationStatus::Unknown);
        assert_eq!(ValidationStatus::parse("Role Based"), ValidationStatus::RoleBased);
    }
}
