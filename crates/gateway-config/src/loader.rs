//! Reading configuration files.

use crate::error::ConfigError;
use crate::settings::GatewayConfig;
use std::path::Path;
use tracing::{debug, info};
use validator::Validate;

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.yaml` / `.yml`
    Yaml,
    /// `.toml`
    Toml,
    /// `.json`
    Json,
}

impl ConfigFormat {
    /// Format implied by a file extension
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("toml") => Ok(Self::Toml),
            Some("json") => Ok(Self::Json),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// Format name used in error messages
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Yaml => "YAML",
            Self::Toml => "TOML",
            Self::Json => "JSON",
        }
    }

    /// Parse a document in this format, without env overrides or validation
    pub fn parse(self, content: &str) -> Result<GatewayConfig, ConfigError> {
        let parse_error = |message: String| ConfigError::Parse {
            format: self.as_str(),
            message,
        };

        match self {
            Self::Yaml => serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string())),
            Self::Toml => toml::from_str(content).map_err(|e| parse_error(e.to_string())),
            Self::Json => serde_json::from_str(content).map_err(|e| parse_error(e.to_string())),
        }
    }
}

/// Parse, apply environment overrides and validate
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<GatewayConfig, ConfigError> {
    parse_config_with(content, format, env_lookup)
}

/// Parse, apply overrides from `lookup` and validate
pub fn parse_config_with<F>(
    content: &str,
    format: ConfigFormat,
    lookup: F,
) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = format.parse(content)?;
    config.apply_env_overrides_with(lookup);
    config.validate()?;
    Ok(config)
}

/// Load a configuration file, apply environment overrides and validate
pub async fn load_config(path: impl AsRef<Path>) -> Result<GatewayConfig, ConfigError> {
    load_config_with(path, env_lookup).await
}

/// Load a configuration file, apply overrides from `lookup` and validate
pub async fn load_config_with<F>(
    path: impl AsRef<Path>,
    lookup: F,
) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path)?;

    debug!(path = %path.display(), format = format.as_str(), "Reading config file");
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let config = parse_config_with(&content, format, lookup)?;
    info!(
        path = %path.display(),
        provider = %config.provider.id,
        model = %config.provider.model,
        "Configuration loaded"
    );
    Ok(config)
}

/// Build a configuration from defaults and environment overrides alone
pub fn config_from_env() -> Result<GatewayConfig, ConfigError> {
    let mut config = GatewayConfig::default();
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
