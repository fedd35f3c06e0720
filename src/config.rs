use crate::quotes::{DEFAULT_API_KEY_ENV, DEFAULT_BASE_URL};
use crate::signals::DEFAULT_CONFIDENCE_THRESHOLD;
use anyhow::Result;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("confidence_threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("instrument universe is empty")]
    EmptyUniverse,

    #[error("duplicate instrument name '{0}'")]
    DuplicateInstrument(String),

    #[error("lookback_days must be at most {max}, got {0}", max = MAX_LOOKBACK_DAYS)]
    LookbackTooLong(u32),
}

/// Upper bound on `lookback_days`, about ten years.
pub const MAX_LOOKBACK_DAYS: u32 = 3650;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub classifier_path: String,
    #[serde(default = "default_favorable_label")]
    pub favorable_label: String,
    #[serde(default = "default_sampling_interval")]
    pub sampling_interval: String,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    #[serde(default = "default_cycle_pause_hours")]
    pub cycle_pause_hours: u64,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Evaluated in this order every cycle.
    pub instruments: Vec<InstrumentConfig>,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default = "default_pacing_delay_seconds")]
    pub pacing_delay_seconds: u64,
    #[serde(default = "default_signal_log_path")]
    pub signal_log_path: String,
    #[serde(default = "default_dataset_path")]
    pub dataset_path: String,
    #[serde(default)]
    pub quotes: QuoteConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
}

/// Display name and provider symbol of one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub name: String,
    pub symbol: String,
}

impl InstrumentConfig {
    pub fn new(name: &str, symbol: &str) -> Self {
        Self {
            name: name.to_string(),
            symbol: symbol.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 8,
            window_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_seconds: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteConfig {
    pub base_url: String,
    pub api_key_env: String,
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// When unset, notifications go to the log.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

fn default_favorable_label() -> String {
    "GAIN".to_string()
}

fn default_sampling_interval() -> String {
    "4h".to_string()
}

fn default_lookback_days() -> u32 {
    60
}

fn default_cycle_pause_hours() -> u64 {
    4
}

fn default_confidence_threshold() -> f64 {
    DEFAULT_CONFIDENCE_THRESHOLD
}

fn default_pacing_delay_seconds() -> u64 {
    1
}

fn default_signal_log_path() -> String {
    "signal_results.csv".to_string()
}

fn default_dataset_path() -> String {
    "datasets/training_dataset.csv".to_string()
}

impl BotConfig {
    pub fn load() -> Result<Self> {
        Self::load_from_file("config.json")
    }

    /// Read `path`, falling back to the built-in defaults when the file
    /// cannot be read. A file that exists but does not parse or validate is
    /// an error.
    pub fn load_from_file(path: &str) -> Result<Self> {
        let config: BotConfig = match fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) => {
                warn!("Could not read {} ({}), using default configuration", path, e);
                Self::default()
            }
        };
        config.validate()?;

        info!(
            "Configuration: {} instruments, interval {}, lookback {}d, threshold {:.2}",
            config.instruments.len(),
            config.sampling_interval,
            config.lookback_days,
            config.confidence_threshold
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::InvalidThreshold(self.confidence_threshold));
        }
        if self.instruments.is_empty() {
            return Err(ConfigError::EmptyUniverse);
        }
        for (i, instrument) in self.instruments.iter().enumerate() {
            if self.instruments[..i].iter().any(|other| other.name == instrument.name) {
                return Err(ConfigError::DuplicateInstrument(instrument.name.clone()));
            }
        }
        if self.lookback_days == 0 {
            return Err(ConfigError::ZeroValue("lookback_days"));
        }
        if self.lookback_days > MAX_LOOKBACK_DAYS {
            return Err(ConfigError::LookbackTooLong(self.lookback_days));
        }
        if self.rate_limit.max_requests == 0 {
            return Err(ConfigError::ZeroValue("rate_limit.max_requests"));
        }
        if self.rate_limit.window_seconds == 0 {
            return Err(ConfigError::ZeroValue("rate_limit.window_seconds"));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ZeroValue("retry.max_attempts"));
        }
        Ok(())
    }

    pub fn cycle_pause(&self) -> Duration {
        Duration::from_secs(self.cycle_pause_hours.saturating_mul(3600))
    }

    pub fn pacing_delay(&self) -> Duration {
        Duration::from_secs(self.pacing_delay_seconds)
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            classifier_path: "model_forest.json".to_string(),
            favorable_label: default_favorable_label(),
            sampling_interval: default_sampling_interval(),
            lookback_days: default_lookback_days(),
            cycle_pause_hours: default_cycle_pause_hours(),
            confidence_threshold: default_confidence_threshold(),
            instruments: vec![
                // US equities
                InstrumentConfig::new("Apple Inc", "AAPL"),
                InstrumentConfig::new("Tesla Inc", "TSLA"),
                // US ETFs
                InstrumentConfig::new("SPDR S&P 500 ETF Trust", "SPY"),
                InstrumentConfig::new("UltraPro Short QQQ", "SQQQ"),
                // Commodities
                InstrumentConfig::new("Gold Spot USD", "XAU/USD"),
                InstrumentConfig::new("Gold Spot Euro", "XAU/EUR"),
                InstrumentConfig::new("Silver Spot AUD", "XAG/AUD"),
            ],
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
            pacing_delay_seconds: default_pacing_delay_seconds(),
            signal_log_path: default_signal_log_path(),
            dataset_path: default_dataset_path(),
            quotes: QuoteConfig::default(),
            notification: NotificationConfig::default(),
        }
    }
}
