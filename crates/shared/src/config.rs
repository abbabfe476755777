//! Application configuration management.
//!
//! Configuration is loaded once at process start and then passed by
//! reference; nothing below the binary reads the environment.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::types::{Currency, Precision, SourceSystem};

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Close configuration.
    #[serde(default)]
    pub close: CloseSettings,
    /// Posting gateway configuration.
    #[serde(default)]
    pub posting: PostingSettings,
}

/// Settings that shape a single close run.
#[derive(Debug, Clone, Deserialize)]
pub struct CloseSettings {
    /// Currency of the ledger of record.
    #[serde(default = "default_currency")]
    pub currency: Currency,
    /// Fractional digits override; defaults to the currency's minor units.
    #[serde(default)]
    pub fractional_digits: Option<u32>,
    /// Sources whose snapshots must be present for every period.
    #[serde(default = "default_required_sources")]
    pub required_sources: Vec<SourceSystem>,
    /// Directory holding persisted period state.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    /// Directory the outbox gateway writes posted entries to.
    #[serde(default = "default_outbox_dir")]
    pub outbox_dir: PathBuf,
}

impl CloseSettings {
    /// Returns the fixed-point precision for all amounts.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `fractional_digits` exceeds what a
    /// decimal amount can carry.
    pub fn precision(&self) -> AppResult<Precision> {
        match self.fractional_digits {
            None => Ok(Precision::for_currency(self.currency)),
            Some(digits) => Precision::new(digits)
                .map_err(|e| AppError::Config(format!("close.fractional_digits: {e}"))),
        }
    }
}

impl Default for CloseSettings {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            fractional_digits: None,
            required_sources: default_required_sources(),
            state_dir: default_state_dir(),
            outbox_dir: default_outbox_dir(),
        }
    }
}

fn default_currency() -> Currency {
    Currency::Usd
}

fn default_required_sources() -> Vec<SourceSystem> {
    vec![
        SourceSystem::LoanServicingRegister,
        SourceSystem::LedgerActuals,
    ]
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("state")
}

fn default_outbox_dir() -> PathBuf {
    PathBuf::from("outbox")
}

/// Retry settings for the posting gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct PostingSettings {
    /// Maximum number of attempts per entry, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Factor applied to the delay after each retry.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: u32,
    /// Upper bound for a single delay in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for PostingSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    4
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_backoff_multiplier() -> u32 {
    2
}

fn default_max_backoff_ms() -> u64 {
    30_000 // 30 seconds
}

impl AppConfig {
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
                config::Environment::with_prefix("MONTHEND")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("close.required_sources")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

/// Loads a standalone configuration document (TOML, JSON or YAML by
/// extension), such as the close policy tables.
///
/// # Errors
///
/// Returns an error if the file is missing or does not deserialize into `T`.
pub fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T, config::ConfigError> {
    config::Config::builder()
        .add_source(config::File::from(path))
        .build()?
        .try_deserialize()
}
