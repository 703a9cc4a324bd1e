//! Process configuration.
//!
//! Sources, later ones winning: built-in defaults, an optional `orbit.toml`
//! (or any format the `config` crate recognises under the `orbit` base
//! name), then `ORBIT__<SECTION>__<FIELD>` environment variables. A `.env`
//! file is loaded into the environment first when present.

use chrono::Duration;
use config::{Config as Cfg, ConfigError, File, FileFormat};
use serde::Deserialize;

use orbit_auth::ThrottlePolicy;
use orbit_core::money::DEFAULT_CURRENCY;
use orbit_invoicing::numbering::INVOICE_NUMBER_PREFIX;
use orbit_observability::ObservabilityConfig;

use crate::repository::query::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: ObservabilityConfig,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub invoicing: InvoicingSettings,
    #[serde(default)]
    pub pagination: PaginationSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_currency")]
    pub default_currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthSettings {
    #[serde(default = "default_max_login_attempts")]
    pub max_login_attempts: usize,
    #[serde(default = "default_login_window_secs")]
    pub login_window_secs: i64,
    #[serde(default = "default_lockout_secs")]
    pub lockout_secs: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InvoicingSettings {
    #[serde(default = "default_number_prefix")]
    pub number_prefix: String,
    /// Attempts at finding an unused invoice or ticket number.
    #[serde(default = "default_number_retries")]
    pub number_retries: u32,
    /// Reload-and-retry attempts when a payment races another write.
    #[serde(default = "default_payment_retries")]
    pub payment_retries: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaginationSettings {
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

fn default_app_name() -> String {
    "Orbit CRM".to_string()
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_max_login_attempts() -> usize {
    5
}

fn default_login_window_secs() -> i64 {
    300
}

fn default_lockout_secs() -> i64 {
    900
}

fn default_number_prefix() -> String {
    INVOICE_NUMBER_PREFIX.to_string()
}

fn default_number_retries() -> u32 {
    5
}

fn default_payment_retries() -> u32 {
    3
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_max_page_size() -> u32 {
    MAX_PAGE_SIZE
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            default_currency: default_currency(),
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            max_login_attempts: default_max_login_attempts(),
            login_window_secs: default_login_window_secs(),
            lockout_secs: default_lockout_secs(),
        }
    }
}

impl Default for InvoicingSettings {
    fn default() -> Self {
        Self {
            number_prefix: default_number_prefix(),
            number_retries: default_number_retries(),
            payment_retries: default_payment_retries(),
        }
    }
}

impl Default for PaginationSettings {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl AuthSettings {
    pub fn throttle_policy(&self) -> ThrottlePolicy {
        ThrottlePolicy {
            max_attempts: self.max_login_attempts,
            window: Duration::seconds(self.login_window_secs),
            lockout: Duration::seconds(self.lockout_secs),
        }
    }
}

impl Settings {
    /// Load from `.env`, `orbit.*` and `ORBIT__*` variables.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(File::with_name("orbit").required(false))
            .add_source(config::Environment::with_prefix("ORBIT").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Parse a TOML document on top of the defaults (no environment).
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        Cfg::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.app.default_currency, "USD");
        assert_eq!(settings.invoicing.number_prefix, "INV");
        assert_eq!(settings.pagination.max_page_size, 100);
        assert_eq!(settings.auth.throttle_policy(), ThrottlePolicy::default());
    }

    #[test]
    fn sections_override_individual_fields() {
        let settings = Settings::from_toml(
            r#"
            [auth]
            max_login_attempts = 3

            [logging]
            level = "debug"
            json = false

            [invoicing]
            payment_retries = 7
            "#,
        )
        .unwrap();

        assert_eq!(settings.auth.max_login_attempts, 3);
        assert_eq!(settings.auth.lockout_secs, 900);
        assert_eq!(settings.logging.level, "debug");
        assert!(!settings.logging.json);
        assert_eq!(settings.invoicing.payment_retries, 7);
        assert_eq!(settings.invoicing.number_retries, 5);
    }

    #[test]
    fn wrong_types_are_errors_not_panics() {
        assert!(Settings::from_toml("[auth]\nmax_login_attempts = \"many\"").is_err());
    }
}
