//! Engine configuration management.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::types::BranchSettings;

/// Engine configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    /// Ledger posting configuration.
    #[serde(default)]
    pub posting: PostingConfig,
    /// Branch defaults used when no branch settings are supplied.
    #[serde(default)]
    pub branch: BranchConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Ledger poster retry and lock configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PostingConfig {
    /// Attempts before a balance conflict is surfaced as `PostingConflict`.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// First retry delay in milliseconds; doubles on each retry.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Upper bound for the retry delay in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Maximum wait for a per-(member, account) lock in milliseconds.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    10
}

fn default_max_backoff_ms() -> u64 {
    200
}

fn default_lock_timeout_ms() -> u64 {
    2000
}

impl Default for PostingConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl PostingConfig {
    /// Lock-wait timeout.
    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Exponential backoff before the given retry (1-based), capped.
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.saturating_sub(1).min(16);
        Duration::from_millis(
            self.initial_backoff_ms
                .saturating_mul(factor)
                .min(self.max_backoff_ms),
        )
    }
}

/// Branch defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct BranchConfig {
    /// Day-count divisor for annual rates.
    #[serde(default = "default_annual_divisor")]
    pub annual_divisor: u32,
    /// Default savings interest tax in percent.
    #[serde(default = "default_tax_interest")]
    pub tax_interest: Decimal,
    /// Currency code new transaction batches are opened in.
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_annual_divisor() -> u32 {
    365
}

fn default_tax_interest() -> Decimal {
    Decimal::from(20)
}

fn default_currency() -> String {
    "PHP".to_string()
}

impl Default for BranchConfig {
    fn default() -> Self {
        Self {
            annual_divisor: default_annual_divisor(),
            tax_interest: default_tax_interest(),
            currency: default_currency(),
        }
    }
}

impl BranchConfig {
    /// Converts the defaults into runtime branch settings.
    #[must_use]
    pub fn settings(&self) -> BranchSettings {
        BranchSettings {
            annual_divisor: self.annual_divisor,
            tax_interest: self.tax_interest,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_filter() -> String {
    "coopledger=debug".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

impl EngineConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("COOPLEDGER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_sources() {
        let config = temp_env::with_var_unset("COOPLEDGER__POSTING__MAX_ATTEMPTS", || {
            EngineConfig::load().unwrap()
        });
        assert_eq!(config.posting.max_attempts, 5);
        assert_eq!(config.branch.annual_divisor, 365);
        assert_eq!(config.branch.currency, "PHP");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_environment_override() {
        let config = temp_env::with_vars(
            [
                ("COOPLEDGER__POSTING__MAX_ATTEMPTS", Some("7")),
                ("COOPLEDGER__BRANCH__ANNUAL_DIVISOR", Some("360")),
            ],
            || EngineConfig::load().unwrap(),
        );
        assert_eq!(config.posting.max_attempts, 7);
        assert_eq!(config.branch.annual_divisor, 360);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let posting = PostingConfig::default();
        assert_eq!(posting.backoff(1), Duration::from_millis(10));
        assert_eq!(posting.backoff(2), Duration::from_millis(20));
        assert_eq!(posting.backoff(3), Duration::from_millis(40));
        assert_eq!(posting.backoff(10), Duration::from_millis(200));
    }

    #[test]
    fn test_branch_settings_from_defaults() {
        let settings = BranchConfig::default().settings();
        assert_eq!(settings.annual_divisor, 365);
        assert_eq!(settings.tax_interest, Decimal::from(20));
    }
}
