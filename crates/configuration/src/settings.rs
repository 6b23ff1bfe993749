use crate::error::ConfigError;
use core_types::{InstrumentSpec, InstrumentTable};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;

/// The root configuration structure for the entire application.
///
/// Every section is optional; an empty file yields the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analytics: AnalyticsSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Tick-based instruments keyed by ticker (e.g. `[instruments.ES]`).
    #[serde(default)]
    pub instruments: HashMap<String, InstrumentSpec>,
}

impl Config {
    /// Builds the read-only instrument table, rejecting non-positive tick
    /// sizes or tick values.
    pub fn instrument_table(&self) -> Result<InstrumentTable, ConfigError> {
        InstrumentTable::from_specs(self.instruments.iter().map(|(ticker, spec)| (ticker, *spec)))
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Checks every section for values the application cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.instrument_table()?;
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "logging.level must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parameters for the aggregate statistics engine.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyticsSettings {
    /// The balance the cumulative equity curve starts from.
    #[serde(default)]
    pub starting_balance: Decimal,
}

/// Where and how verbosely to log.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is not set (e.g. "info" or
    /// "journal=debug,info").
    #[serde(default = "default_level")]
    pub level: String,
    /// When set, logs are also written to a daily-rolling file in this directory.
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default = "default_file_name")]
    pub file_name: String,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_file_name() -> String {
    "trade-journal.log".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            directory: None,
            file_name: default_file_name(),
        }
    }
}
