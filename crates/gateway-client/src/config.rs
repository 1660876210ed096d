//! HTTP provider configuration.

use gateway_config::ProviderSettings;
use gateway_core::{GatewayError, GatewayResult};
use secrecy::{ExposeSecret, Secret};
use std::time::Duration;
use url::Url;

/// Configuration of the HTTP completion provider.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Provider identifier reported in responses.
    pub(crate) provider_id: String,
    /// Base URL of the completion API.
    pub(crate) base_url: Url,
    /// API key sent as a bearer token.
    pub(crate) api_key: Secret<String>,
    /// Model sent with every request.
    pub(crate) model: String,
    /// Request timeout duration.
    pub(crate) timeout: Duration,
    /// Connection timeout duration.
    pub(crate) connect_timeout: Duration,
    /// User agent string.
    pub(crate) user_agent: String,
}

impl ClientConfig {
    /// Default request timeout (30 seconds).
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
    /// Default connection timeout (10 seconds).
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    /// Default user agent.
    pub const DEFAULT_USER_AGENT: &'static str =
        concat!("completion-gateway/", env!("CARGO_PKG_VERSION"));

    /// Create a configuration with default timeouts.
    ///
    /// A trailing slash is added to the base URL so that relative joins keep
    /// its path.
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> GatewayResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(GatewayError::configuration("API key is empty"));
        }

        Ok(Self {
            provider_id: "openai".to_string(),
            base_url: parse_base_url(base_url)?,
            api_key: Secret::new(api_key),
            model: model.into(),
            timeout: Self::DEFAULT_TIMEOUT,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            user_agent: Self::DEFAULT_USER_AGENT.to_string(),
        })
    }

    /// Build from loaded provider settings.
    ///
    /// Fails when no API key was configured or the base URL does not parse.
    pub fn from_settings(settings: &ProviderSettings) -> GatewayResult<Self> {
        let api_key = settings.api_key.as_ref().ok_or_else(|| {
            GatewayError::configuration(format!(
                "No API key configured for provider '{}'",
                settings.id
            ))
        })?;

        let mut config = Self::new(
            &settings.base_url,
            api_key.expose_secret().clone(),
            settings.model.clone(),
        )?;
        config.provider_id = settings.id.clone();
        config.timeout = settings.request_timeout;
        Ok(config)
    }

    /// Set the provider identifier.
    #[must_use]
    pub fn with_provider_id(mut self, id: impl Into<String>) -> Self {
        self.provider_id = id.into();
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the provider identifier.
    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    /// Get the base URL.
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Get the model.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the request timeout.
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Get the API key (exposed for use in requests).
    pub(crate) fn api_key_value(&self) -> &str {
        self.api_key.expose_secret().as_str()
    }

    /// Endpoint that completions are posted to.
    pub(crate) fn completions_url(&self) -> GatewayResult<Url> {
        self.base_url
            .join("chat/completions")
            .map_err(|e| GatewayError::configuration(format!("Invalid completions URL: {e}")))
    }
}

fn parse_base_url(raw: &str) -> GatewayResult<Url> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };

    let url = Url::parse(&normalized)
        .map_err(|e| GatewayError::configuration(format!("Invalid base URL '{raw}': {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(GatewayError::configuration(format!(
            "Base URL must use http or https, got '{scheme}'"
        ))),
    }
}
