//! # Settlement Configuration
//!
//! Configuration management for the settlement engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     CARTERA_EVENT_TIMEOUT_MS=5000                                      │
//! │     CARTERA_DEFAULT_TAX_RATE=0.21                                      │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/cartera/settlement.toml (Linux)                          │
//! │     ~/Library/Application Support/com.cartera.cartera/settlement.toml  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     10s event deadline, 3 retries, no tax, no card plans               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # settlement.toml
//! [engine]
//! event_timeout_ms = 10000
//! max_step_retries = 3
//! initial_backoff_ms = 50
//! max_backoff_ms = 1000
//!
//! [store]
//! final_consumer_id = "00000000-0000-0000-0000-000000000000"
//! default_tax_rate = "0.21"
//!
//! [[card_plans]]
//! name = "3 cuotas"
//! installments = 3
//! interest_rate = "0.15"
//! ```

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use cartera_core::types::CardPlan;
use cartera_core::{Rate, FINAL_CONSUMER_ID};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// Engine Settings
// =============================================================================

/// Deadline and retry behavior of every settlement event.
///
/// ## Retry Timeline
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  event start                                       event deadline       │
/// │      │◄──────────────── event_timeout_ms ──────────────────►│          │
/// │      │                                                      │          │
/// │      step ✗ storage ─ 50ms ─ retry ✗ ─ 100ms ─ retry ✓      │          │
/// │                                                             │          │
/// │  A step still running at the deadline fails with Timeout.  │          │
/// │  After max_step_retries the last storage error is final.   │          │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Wall-clock limit for a whole event, reads and writes included.
    #[serde(default = "default_event_timeout")]
    pub event_timeout_ms: u64,

    /// Re-attempts of a step after a storage failure (0 = no retry).
    #[serde(default = "default_max_step_retries")]
    pub max_step_retries: u32,

    /// First retry delay.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Ceiling for the exponential delay.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_event_timeout() -> u64 {
    10_000
}
fn default_max_step_retries() -> u32 {
    3
}
fn default_initial_backoff() -> u64 {
    50
}
fn default_max_backoff() -> u64 {
    1_000
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            event_timeout_ms: default_event_timeout(),
            max_step_retries: default_max_step_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

// =============================================================================
// Store Settings
// =============================================================================

/// Business defaults of the store running the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Customer id of the walk-in placeholder.
    #[serde(default = "default_final_consumer_id")]
    pub final_consumer_id: String,

    /// Tax applied when a checkout does not name one.
    #[serde(default)]
    pub default_tax_rate: Rate,
}

fn default_final_consumer_id() -> String {
    FINAL_CONSUMER_ID.to_string()
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            final_consumer_id: default_final_consumer_id(),
            default_tax_rate: Rate::zero(),
        }
    }
}

// =============================================================================
// Main Settlement Configuration
// =============================================================================

/// Complete settlement configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettlementConfig {
    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub store: StoreSettings,

    /// Installment plans offered for credit card sales.
    #[serde(default)]
    pub card_plans: Vec<CardPlan>,
}

impl SettlementConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (settlement.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading settlement config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load settlement config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ConfigError::SaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Settlement config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.engine.event_timeout_ms == 0 {
            return Err(ConfigError::Invalid("event_timeout_ms must be greater than 0".into()));
        }

        if self.engine.max_backoff_ms < self.engine.initial_backoff_ms {
            return Err(ConfigError::Invalid(
                "max_backoff_ms must not be smaller than initial_backoff_ms".into(),
            ));
        }

        if self.store.final_consumer_id.trim().is_empty() {
            return Err(ConfigError::Invalid("final_consumer_id must not be empty".into()));
        }

        if self.store.default_tax_rate.is_negative() {
            return Err(ConfigError::Invalid("default_tax_rate must not be negative".into()));
        }

        for plan in &self.card_plans {
            if plan.name.trim().is_empty() {
                return Err(ConfigError::Invalid("card plan name must not be empty".into()));
            }
            if plan.installments == 0 {
                return Err(ConfigError::Invalid(format!(
                    "card plan '{}' must have at least one installment",
                    plan.name
                )));
            }
            if plan.interest_rate.is_negative() {
                return Err(ConfigError::Invalid(format!(
                    "card plan '{}' has a negative interest rate",
                    plan.name
                )));
            }
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Some(ms) = env_parse::<u64>("CARTERA_EVENT_TIMEOUT_MS") {
            debug!(event_timeout_ms = ms, "Overriding event timeout from environment");
            self.engine.event_timeout_ms = ms;
        }

        if let Some(retries) = env_parse::<u32>("CARTERA_MAX_STEP_RETRIES") {
            self.engine.max_step_retries = retries;
        }

        if let Some(ms) = env_parse::<u64>("CARTERA_INITIAL_BACKOFF_MS") {
            self.engine.initial_backoff_ms = ms;
        }

        if let Some(ms) = env_parse::<u64>("CARTERA_MAX_BACKOFF_MS") {
            self.engine.max_backoff_ms = ms;
        }

        if let Ok(id) = std::env::var("CARTERA_FINAL_CONSUMER_ID") {
            self.store.final_consumer_id = id;
        }

        if let Some(rate) = env_parse::<Decimal>("CARTERA_DEFAULT_TAX_RATE") {
            debug!(rate = %rate, "Overriding default tax rate from environment");
            self.store.default_tax_rate = Rate::new(rate);
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "cartera", "cartera")
            .map(|dirs| dirs.config_dir().join("settlement.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn event_timeout(&self) -> Duration {
        Duration::from_millis(self.engine.event_timeout_ms)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.engine.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.engine.max_backoff_ms)
    }

    /// Finds a card plan by name (case-insensitive).
    pub fn card_plan(&self, name: &str) -> Option<&CardPlan> {
        self.card_plans
            .iter()
            .find(|plan| plan.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn is_final_consumer(&self, customer_id: &str) -> bool {
        customer_id == self.store.final_consumer_id
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key = %key, value = %raw, "Ignoring unparsable environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = r#"
        [engine]
        event_timeout_ms = 2500
        max_step_retries = 5

        [store]
        default_tax_rate = "0.21"

        [[card_plans]]
        name = "3 cuotas"
        installments = 3
        interest_rate = "0.15"

        [[card_plans]]
        name = "6 cuotas"
        installments = 6
        interest_rate = "0.32"
    "#;

    #[test]
    fn test_default_config() {
        let config = SettlementConfig::default();
        assert_eq!(config.engine.event_timeout_ms, 10_000);
        assert_eq!(config.engine.max_step_retries, 3);
        assert_eq!(config.store.final_consumer_id, FINAL_CONSUMER_ID);
        assert!(config.card_plans.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml_with_partial_sections() {
        let config: SettlementConfig = toml::from_str(SAMPLE).unwrap();

        assert_eq!(config.event_timeout(), Duration::from_millis(2500));
        assert_eq!(config.engine.max_step_retries, 5);
        // Unset fields keep their defaults
        assert_eq!(config.engine.initial_backoff_ms, 50);
        assert_eq!(config.store.default_tax_rate, Rate::new(dec!(0.21)));

        let plan = config.card_plan("3 CUOTAS").unwrap();
        assert_eq!(plan.installments, 3);
        assert_eq!(plan.interest_rate, Rate::new(dec!(0.15)));
        assert!(config.card_plan("12 cuotas").is_none());
    }

    #[test]
    fn test_toml_round_trip() {
        let config: SettlementConfig = toml::from_str(SAMPLE).unwrap();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[engine]"));
        assert!(toml_str.contains("[[card_plans]]"));

        let back: SettlementConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_config_validation() {
        let mut config = SettlementConfig::default();

        config.engine.event_timeout_ms = 0;
        assert!(config.validate().is_err());
        config.engine.event_timeout_ms = 1000;

        config.engine.max_backoff_ms = 10;
        assert!(config.validate().is_err());
        config.engine.max_backoff_ms = 1000;

        config.card_plans.push(CardPlan {
            name: "0 cuotas".into(),
            installments: 0,
            interest_rate: Rate::zero(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_with_env_override() {
        let dir = std::env::temp_dir().join(format!("cartera-config-{}", uuid::Uuid::new_v4()));
        let path = dir.join("settlement.toml");

        let mut config = SettlementConfig::default();
        config.store.default_tax_rate = Rate::from_bps(1050);
        config.save(Some(path.clone())).unwrap();

        std::env::set_var("CARTERA_MAX_STEP_RETRIES", "7");
        let loaded = SettlementConfig::load(Some(path)).unwrap();
        std::env::remove_var("CARTERA_MAX_STEP_RETRIES");

        assert_eq!(loaded.store.default_tax_rate, Rate::from_bps(1050));
        assert_eq!(loaded.engine.max_step_retries, 7);

        let _ = std::fs::remove_dir_all(dir);
    }
}
