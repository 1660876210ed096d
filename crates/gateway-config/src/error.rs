//! Configuration errors.

use gateway_core::GatewayError;
use std::path::PathBuf;

/// Failure to load or validate configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// File that was read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file extension names no supported format
    #[error("Unsupported config format for {0} (expected .yaml, .yml, .toml or .json)")]
    UnsupportedFormat(PathBuf),

    /// The contents did not parse
    #[error("Invalid {format} config: {message}")]
    Parse {
        /// Format being parsed
        format: &'static str,
        /// Parser message
        message: String,
    },

    /// A value is out of range or malformed
    #[error("Config validation failed: {0}")]
    Validation(String),
}

impl From<validator::ValidationErrors> for ConfigError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl From<ConfigError> for GatewayError {
    fn from(error: ConfigError) -> Self {
        Self::configuration(error.to_string())
    }
}
