//! Runtime settings. A value given on the command line wins over one stored
//! in the `settings` table, which wins over the built-in default.

use crate::db::Store;
use crate::error::{Result, ValidationError};
use std::fmt;
use tracing::warn;

pub const DEFAULT_DUE_HORIZON_DAYS: i64 = 7;
pub const DEFAULT_QUOTE_URL: &str = "https://dolarapi.com/v1/dolares/blue";
pub const DEFAULT_QUOTE_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_PURGE_DAYS: i64 = 365;

/// Keys persisted in the settings table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    DueHorizonDays,
    QuoteUrl,
    /// Written by the quote lookup, never by the user
    LastQuote,
}

impl SettingKey {
    pub const USER_KEYS: &'static str = "due_horizon_days, quote_url";

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::DueHorizonDays => "due_horizon_days",
            SettingKey::QuoteUrl => "quote_url",
            SettingKey::LastQuote => "last_quote",
        }
    }

    /// Parse a key the user may set
    pub fn parse_user_key(s: &str) -> std::result::Result<Self, ValidationError> {
        match s {
            "due_horizon_days" => Ok(SettingKey::DueHorizonDays),
            "quote_url" => Ok(SettingKey::QuoteUrl),
            _ => Err(ValidationError::InvalidChoice {
                field: "key",
                value: s.to_string(),
                allowed: Self::USER_KEYS,
            }),
        }
    }

    /// Check a raw value before it is stored
    pub fn validate(&self, value: &str) -> std::result::Result<String, ValidationError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ValidationError::MissingField {
                field: self.as_str(),
            });
        }
        if *self == SettingKey::DueHorizonDays {
            let days: i64 = value.parse().map_err(|_| ValidationError::InvalidNumber {
                field: "due_horizon_days",
                value: value.to_string(),
            })?;
            if days < 0 {
                return Err(ValidationError::OutOfRange {
                    field: "due_horizon_days",
                    reason: "must not be negative",
                });
            }
        }
        Ok(value.to_string())
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Effective settings for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub due_horizon_days: i64,
    pub quote_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            due_horizon_days: DEFAULT_DUE_HORIZON_DAYS,
            quote_url: DEFAULT_QUOTE_URL.to_string(),
        }
    }
}

impl Settings {
    /// Stored values over defaults. An unreadable stored value falls back to
    /// the default with a warning.
    pub fn load(store: &Store) -> Result<Self> {
        let mut settings = Settings::default();

        if let Some(raw) = store.get_setting(SettingKey::DueHorizonDays.as_str())? {
            match raw.parse::<i64>() {
                Ok(days) if days >= 0 => settings.due_horizon_days = days,
                _ => warn!(value = %raw, "ignoring invalid stored due_horizon_days"),
            }
        }
        if let Some(url) = store.get_setting(SettingKey::QuoteUrl.as_str())? {
            settings.quote_url = url;
        }

        Ok(settings)
    }

    /// Apply per-invocation overrides
    pub fn with_overrides(mut self, due_horizon_days: Option<i64>, quote_url: Option<String>) -> Self {
        if let Some(days) = due_horizon_days {
            self.due_horizon_days = days;
        }
        if let Some(url) = quote_url {
            self.quote_url = url;
        }
        self
    }

    pub fn get(&self, key: SettingKey) -> Option<String> {
        match key {
            SettingKey::DueHorizonDays => Some(self.due_horizon_days.to_string()),
            SettingKey::QuoteUrl => Some(self.quote_url.clone()),
            SettingKey::LastQuote => None,
        }
    }
}
