//! # Gateway Config
//!
//! Configuration for the completion gateway, loaded from YAML, TOML or JSON
//! files with `GATEWAY_*` environment overrides and validated on load.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod settings;

pub use error::ConfigError;
pub use loader::{
    config_from_env, load_config, load_config_with, parse_config, parse_config_with, ConfigFormat,
};
pub use settings::{
    BatchSettings, CacheSettings, GatewayConfig, ProviderSettings, RetrySettings, ENV_API_KEY,
    ENV_BASE_URL, ENV_LOG_LEVEL, ENV_MODEL,
};
