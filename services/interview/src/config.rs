//! Application Configuration Module
//!
//! Loads settings for the terminal client from environment variables (and a
//! `.env` file, if present) into a single struct passed through the app.

use interview_core::ModelSettings;
use secrecy::SecretString;
use std::env;
use std::path::PathBuf;
use tracing::Level;

pub const DEFAULT_DATA_DIR: &str = ".interview";

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini: ModelSettings,
    pub data_dir: PathBuf,
    pub log_level: Level,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// * `GEMINI_API_KEY`: required.
    /// * `GEMINI_BASE_URL`: (Optional) alternative API root.
    /// * `TEXT_MODEL` / `TTS_MODEL`: (Optional) model overrides.
    /// * `DATA_DIR`: (Optional) where interview history is kept. Defaults to `.interview`.
    /// * `PROMPTS_DIR`: (Optional) directory of `*.md` prompt overrides.
    /// * `RUST_LOG`: (Optional) the logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. Ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let gemini_api_key = var("GEMINI_API_KEY")
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingVar("GEMINI_API_KEY".to_string()))?;

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            gemini: ModelSettings::new(gemini_api_key).with_overrides(&var),
            data_dir: var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            log_level,
        })
    }

}
