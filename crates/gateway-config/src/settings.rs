//! Configuration model.

use gateway_core::request::{TEMPERATURE_RANGE, TOP_P_RANGE};
use gateway_core::RequestDefaults;
use gateway_resilience::{BackoffTable, CacheConfig, RateLimits, RetryConfig};
use gateway_telemetry::LoggingConfig;
use secrecy::Secret;
use serde::Deserialize;
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Environment variable holding the API key
pub const ENV_API_KEY: &str = "GATEWAY_API_KEY";
/// Environment variable overriding the provider base URL
pub const ENV_BASE_URL: &str = "GATEWAY_BASE_URL";
/// Environment variable overriding the model
pub const ENV_MODEL: &str = "GATEWAY_MODEL";
/// Environment variable overriding the log level
pub const ENV_LOG_LEVEL: &str = "GATEWAY_LOG_LEVEL";

/// Complete gateway configuration
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct GatewayConfig {
    /// Remote completion provider
    #[validate(nested)]
    pub provider: ProviderSettings,

    /// Local quotas
    pub rate_limits: RateLimits,

    /// Response cache
    #[validate(nested)]
    pub cache: CacheSettings,

    /// Retry behaviour
    #[validate(nested)]
    pub retry: RetrySettings,

    /// Batch fan-out
    #[validate(nested)]
    pub batch: BatchSettings,

    /// Sampling parameters for requests that leave them unset
    #[validate(custom(function = "validate_defaults"))]
    pub defaults: RequestDefaults,

    /// Log output
    pub logging: LoggingConfig,
}

impl GatewayConfig {
    /// Apply `GATEWAY_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_with(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_env_overrides_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(key) = read(ENV_API_KEY) {
            self.provider.api_key = Some(Secret::new(key));
        } else if self.provider.api_key.is_none() {
            if let Some(var) = self.provider.api_key_env.as_deref() {
                self.provider.api_key = read(var).map(Secret::new);
            }
        }
        if let Some(url) = read(ENV_BASE_URL) {
            self.provider.base_url = url;
        }
        if let Some(model) = read(ENV_MODEL) {
            self.provider.model = model;
        }
        if let Some(level) = read(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
    }
}

/// Remote provider settings
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_provider"))]
pub struct ProviderSettings {
    /// Provider identifier reported in responses
    #[validate(length(min = 1))]
    pub id: String,

    /// Base URL; completions are posted to `{base_url}/chat/completions`
    #[validate(url)]
    pub base_url: String,

    /// API key
    pub api_key: Option<Secret<String>>,

    /// Variable to read the key from when `api_key` is unset
    pub api_key_env: Option<String>,

    /// Model sent with every request
    #[validate(length(min = 1))]
    pub model: String,

    /// Deadline of a single attempt
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            id: "openai".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            api_key_env: None,
            model: "gpt-4o-mini".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Response cache settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_cache"))]
pub struct CacheSettings {
    /// Serve repeated requests from memory
    pub enabled: bool,
    /// Lifetime of a cached response
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    /// Interval of the background expiry sweep
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        let defaults = CacheConfig::default();
        Self {
            enabled: true,
            ttl: defaults.default_ttl,
            sweep_interval: defaults.sweep_interval,
        }
    }
}

impl From<CacheSettings> for CacheConfig {
    fn from(settings: CacheSettings) -> Self {
        Self {
            default_ttl: settings.ttl,
            sweep_interval: settings.sweep_interval,
        }
    }
}

/// Retry settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Validate)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts including the first
    #[validate(range(min = 1, max = 20))]
    pub max_attempts: u32,
    /// Upper bound on a whole call, retries and backoff included
    #[serde(with = "humantime_serde")]
    pub call_deadline: Option<Duration>,
    /// Base delays per error kind
    pub backoff: BackoffTable,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            call_deadline: None,
            backoff: BackoffTable::default(),
        }
    }
}

impl From<RetrySettings> for RetryConfig {
    fn from(settings: RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            backoff: settings.backoff,
        }
    }
}

/// Batch settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Validate)]
#[serde(default)]
pub struct BatchSettings {
    /// Calls of one batch in flight at once
    #[validate(range(min = 1, max = 256))]
    pub concurrency: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self { concurrency: 10 }
    }
}

fn validate_provider(settings: &ProviderSettings) -> Result<(), ValidationError> {
    if settings.request_timeout.is_zero() {
        return Err(ValidationError::new("request_timeout_zero")
            .with_message("provider.request_timeout must be greater than zero".into()));
    }
    Ok(())
}

fn validate_cache(settings: &CacheSettings) -> Result<(), ValidationError> {
    if settings.sweep_interval.is_zero() {
        return Err(ValidationError::new("sweep_interval_zero")
            .with_message("cache.sweep_interval must be greater than zero".into()));
    }
    Ok(())
}

fn validate_defaults(defaults: &RequestDefaults) -> Result<(), ValidationError> {
    if !(TEMPERATURE_RANGE.0..=TEMPERATURE_RANGE.1).contains(&defaults.temperature) {
        return Err(ValidationError::new("temperature_range")
            .with_message("defaults.temperature must be between 0 and 2".into()));
    }
    if !(TOP_P_RANGE.0..=TOP_P_RANGE.1).contains(&defaults.top_p) {
        return Err(ValidationError::new("top_p_range")
            .with_message("defaults.top_p must be between 0 and 1".into()));
    }
    if defaults.max_tokens == 0 {
        return Err(ValidationError::new("max_tokens_zero")
            .with_message("defaults.max_tokens must be at least 1".into()));
    }
    Ok(())
}
