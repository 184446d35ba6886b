//! Configuration management
//!
//! Settings live in `<parsec_dir>/settings.json`:
//! ```json
//! {
//!   "pricing": { "searchCost": "0.50", "emailCheckCost": "0.10" },
//!   "limits": { "maxEmailsPerCheck": 50, "resultCap": 100, "cacheTtlDays": 90 },
//!   "accounts": { "defaultFreeSearches": 3 },
//!   "telegram": { "botToken": "...", "chatId": "..." }
//! }
//! ```
//! Every field is optional. Environment variables override the file.

use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::result::{Error, Result};
use crate::domain::MeteredOperation;

pub const DEFAULT_SEARCH_COST: Decimal = Decimal::from_parts(50, 0, 0, false, 2);
pub const DEFAULT_EMAIL_CHECK_COST: Decimal = Decimal::from_parts(10, 0, 0, false, 2);
pub const DEFAULT_MAX_EMAILS_PER_CHECK: usize = 50;
pub const DEFAULT_RESULT_CAP: usize = 100;
pub const DEFAULT_CACHE_TTL_DAYS: i64 = 90;
pub const DEFAULT_MAX_BATCH_INSERT: usize = 1000;
pub const DEFAULT_FREE_SEARCHES: i64 = 3;
pub const DEFAULT_POOL_SIZE: usize = 4;

/// Raw settings.json structure
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    pricing: PricingSettings,
    #[serde(default)]
    limits: LimitSettings,
    #[serde(default)]
    accounts: AccountSettings,
    #[serde(default)]
    telegram: TelegramSettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PricingSettings {
    #[serde(default)]
    search_cost: Option<Decimal>,
    #[serde(default)]
    email_check_cost: Option<Decimal>,
    #[serde(default)]
    email_uses_free_allowance: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LimitSettings {
    #[serde(default)]
    max_emails_per_check: Option<usize>,
    #[serde(default)]
    result_cap: Option<usize>,
    #[serde(default)]
    cache_ttl_days: Option<i64>,
    #[serde(default)]
    max_batch_insert: Option<usize>,
    #[serde(default)]
    pool_size: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountSettings {
    #[serde(default)]
    default_free_searches: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TelegramSettings {
    #[serde(default)]
    bot_token: Option<String>,
    #[serde(default)]
    chat_id: Option<String>,
}

/// Parsec configuration (resolved view of settings + environment)
#[derive(Debug, Clone)]
pub struct Config {
    pub search_cost: Decimal,
    pub email_check_cost: Decimal,
    pub email_uses_free_allowance: bool,
    pub max_emails_per_check: usize,
    pub result_cap: usize,
    pub cache_ttl_days: i64,
    pub max_batch_insert: usize,
    pub default_free_searches: i64,
    pub pool_size: usize,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search_cost: DEFAULT_SEARCH_COST,
            email_check_cost: DEFAULT_EMAIL_CHECK_COST,
            email_uses_free_allowance: false,
            max_emails_per_check: DEFAULT_MAX_EMAILS_PER_CHECK,
            result_cap: DEFAULT_RESULT_CAP,
            cache_ttl_days: DEFAULT_CACHE_TTL_DAYS,
            max_batch_insert: DEFAULT_MAX_BATCH_INSERT,
            default_free_searches: DEFAULT_FREE_SEARCHES,
            pool_size: DEFAULT_POOL_SIZE,
            telegram_bot_token: None,
            telegram_chat_id: None,
        }
    }
}

impl Config {
    /// Load config from the parsec directory, then apply `PARSEC_*`
    /// environment overrides
    pub fn load(parsec_dir: &Path) -> Result<Self> {
        let settings_path = parsec_dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content)
                .map_err(|e| Error::Config(format!("{}: {}", settings_path.display(), e)))?
        } else {
            SettingsFile::default()
        };

        let mut config = Self::from_settings(raw);
        config.apply_env(|key| std::env::var(key).ok())?;
        config.check()?;
        Ok(config)
    }

    fn from_settings(raw: SettingsFile) -> Self {
        let d = Self::default();
        Self {
            search_cost: raw.pricing.search_cost.unwrap_or(d.search_cost),
            email_check_cost: raw.pricing.email_check_cost.unwrap_or(d.email_check_cost),
            email_uses_free_allowance: raw
                .pricing
                .email_uses_free_allowance
                .unwrap_or(d.email_uses_free_allowance),
            max_emails_per_check: raw
                .limits
                .max_emails_per_check
                .unwrap_or(d.max_emails_per_check),
            result_cap: raw.limits.result_cap.unwrap_or(d.result_cap),
            cache_ttl_days: raw.limits.cache_ttl_days.unwrap_or(d.cache_ttl_days),
            max_batch_insert: raw.limits.max_batch_insert.unwrap_or(d.max_batch_insert),
            default_free_searches: raw
                .accounts
                .default_free_searches
                .unwrap_or(d.default_free_searches),
            pool_size: raw.limits.pool_size.unwrap_or(d.pool_size),
            telegram_bot_token: raw.telegram.bot_token,
            telegram_chat_id: raw.telegram.chat_id,
        }
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production, a map in tests)
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("PARSEC_SEARCH_COST") {
            self.search_cost = parse_env("PARSEC_SEARCH_COST", &v)?;
        }
        if let Some(v) = lookup("PARSEC_EMAIL_CHECK_COST") {
            self.email_check_cost = parse_env("PARSEC_EMAIL_CHECK_COST", &v)?;
        }
        if let Some(v) = lookup("PARSEC_MAX_EMAILS_PER_CHECK") {
            self.max_emails_per_check = parse_env("PARSEC_MAX_EMAILS_PER_CHECK", &v)?;
        }
        if let Some(v) = lookup("PARSEC_RESULT_CAP") {
            self.result_cap = parse_env("PARSEC_RESULT_CAP", &v)?;
        }
        if let Some(v) = lookup("PARSEC_CACHE_TTL_DAYS") {
            self.cache_ttl_days = parse_env("PARSEC_CACHE_TTL_DAYS", &v)?;
        }
        if let Some(v) = lookup("PARSEC_TELEGRAM_BOT_TOKEN").filter(|v| !v.trim().is_empty()) {
            self.telegram_bot_token = Some(v);
        }
        if let Some(v) = lookup("PARSEC_TELEGRAM_CHAT_ID").filter(|v| !v.trim().is_empty()) {
            self.telegram_chat_id = Some(v);
        }
        Ok(())
    }

    fn check(&self) -> Result<()> {
        for (name, cost) in [
            ("search cost", self.search_cost),
            ("email check cost", self.email_check_cost),
        ] {
            if cost <= Decimal::ZERO {
                return Err(Error::Config(format!("{} must be positive", name)));
            }
            // Balances are kept in whole cents
            if cost.normalize().scale() > 2 {
                return Err(Error::Config(format!(
                    "{} must be a whole number of cents, got {}",
                    name, cost
                )));
            }
        }
        if self.result_cap == 0 || self.max_emails_per_check == 0 || self.max_batch_insert == 0 {
            return Err(Error::Config("limits must be at least 1".into()));
        }
        if self.cache_ttl_days <= 0 {
            return Err(Error::Config("cache TTL must be at least one day".into()));
        }
        if self.default_free_searches < 0 {
            return Err(Error::Config("default free searches cannot be negative".into()));
        }
        Ok(())
    }

    pub fn search_operation(&self) -> MeteredOperation {
        MeteredOperation {
            name: "search",
            cost: self.search_cost,
            uses_free_allowance: true,
        }
    }

    pub fn email_operation(&self) -> MeteredOperation {
        MeteredOperation {
            name: "email_validation",
            cost: self.email_check_cost,
            uses_free_allowance: self.email_uses_free_allowance,
        }
    }

    pub fn telegram_configured(&self) -> bool {
        self.telegram_bot_token.is_some() && self.telegram_chat_id.is_some()
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| Error::Config(format!("{}={:?}: {}", key, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.search_cost.to_string(), "0.50");
        assert_eq!(config.email_check_cost.to_string(), "0.10");
        assert_eq!(config.result_cap, 100);
        assert_eq!(config.max_emails_per_check, 50);
        assert_eq!(config.cache_ttl_days, 90);
        assert!(config.search_operation().uses_free_allowance);
        assert!(!config.email_operation().uses_free_allowance);
    }

    #[test]
    fn test_empty_settings_use_defaults() {
        let config = Config::from_settings(SettingsFile::default());
        assert_eq!(config.result_cap, DEFAULT_RESULT_CAP);
        assert_eq!(config.default_free_searches, DEFAULT_FREE_SEARCHES);
        assert!(config.telegram_bot_token.is_none());
    }

    #[test]
    fn test_settings_file_values() {
        let raw: SettingsFile = serde_json::from_str(
            r#"{"pricing":{"searchCost":"1.25"},"limits":{"resultCap":10},"telegram":{"chatId":"42"}}"#,
        )
        .unwrap();
        let config = Config::from_settings(raw);
        assert_eq!(config.search_cost, Decimal::new(125, 2));
        assert_eq!(config.result_cap, 10);
        assert_eq!(config.telegram_chat_id.as_deref(), Some("42"));
        assert!(!config.telegram_configured());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("PARSEC_EMAIL_CHECK_COST", "0.25"),
                ("PARSEC_RESULT_CAP", "5"),
                ("PARSEC_TELEGRAM_BOT_TOKEN", "abc"),
                ("PARSEC_TELEGRAM_CHAT_ID", "-100"),
            ]))
            .unwrap();
        assert_eq!(config.email_check_cost, Decimal::new(25, 2));
        assert_eq!(config.result_cap, 5);
        assert!(config.telegram_configured());
    }

    #[test]
    fn test_invalid_env_value_is_config_error() {
        let mut config = Config::default();
        let err = config
            .apply_env(env(&[("PARSEC_CACHE_TTL_DAYS", "ninety")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_unknown_settings_are_ignored() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"ui":{"theme":"dark"},"limits":{"resultCap":7}}"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.result_cap, 7);
    }

    #[test]
    fn test_sub_cent_costs_rejected() {
        for cost in ["0.001", "0.005", "0.125"] {
            let mut config = Config::default();
            config
                .apply_env(env(&[("PARSEC_SEARCH_COST", cost)]))
                .unwrap();
            let err = config.check().unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{} accepted", cost);
        }

        let mut config = Config::default();
        config
            .apply_env(env(&[("PARSEC_EMAIL_CHECK_COST", "0.0001")]))
            .unwrap();
        assert!(config.check().is_err());
    }

    #[test]
    fn test_whole_cent_costs_accepted() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("PARSEC_SEARCH_COST", "0.01"),
                ("PARSEC_EMAIL_CHECK_COST", "1.500"),
            ]))
            .unwrap();
        assert!(config.check().is_ok());
    }
}
