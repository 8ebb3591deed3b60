//! Configuration management for the transit CMAC service

use config::{Config, Environment};
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Prefix for every environment variable read by [`TransitConfig::from_env`]
pub const ENV_PREFIX: &str = "TRANSIT";

const DEFAULT_STORAGE_PATH: &str = "./keys";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output (development)
    Console,
    /// JSON lines (production)
    Json,
}

/// Transit service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TransitConfig {
    /// Directory holding the encrypted key policies
    pub storage_path: PathBuf,
    /// Worker threads used to compute one batch. 1 means sequential.
    pub batch_parallelism: usize,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for TransitConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            batch_parallelism: 1,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_format: LogFormat::Console,
        }
    }
}

impl TransitConfig {
    /// Load configuration from `TRANSIT_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        Self::from_environment(Environment::with_prefix(ENV_PREFIX))
    }

    /// Load configuration from an explicit environment source, applying defaults
    /// for anything the source does not set.
    pub fn from_environment(source: Environment) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("storage_path", DEFAULT_STORAGE_PATH)?
            .set_default("batch_parallelism", 1i64)?
            .set_default("log_level", DEFAULT_LOG_LEVEL)?
            .set_default("log_format", "console")?
            .add_source(source.try_parsing(true))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_parallelism == 0 {
            return Err(ConfigError::Invalid {
                field: "batch_parallelism",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "log_level",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Get log level, defaulting to "info"
    pub fn log_level(&self) -> &str {
        if self.log_level.is_empty() {
            DEFAULT_LOG_LEVEL
        } else {
            &self.log_level
        }
    }
}
