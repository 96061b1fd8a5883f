//! Configuration error types.
//!
//! Domain errors live next to the domain (`wxcache_weather::WeatherError`);
//! this crate only owns what can go wrong while locating, reading and
//! validating the configuration file.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No platform configuration directory available")]
    NoConfigDir,

    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write configuration file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration parse error in {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NoConfigDir => "No configuration directory found. Using defaults.",
            ConfigError::Read { .. } => "Configuration could not be read. Check file permissions.",
            ConfigError::Write { .. } => "Configuration could not be saved. Check file permissions.",
            ConfigError::ParseError { .. } => {
                "Configuration file is malformed. Check your settings."
            }
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
        }
    }
}
