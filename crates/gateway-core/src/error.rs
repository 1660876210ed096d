//! Error taxonomy for the gateway.
//!
//! Every failure a caller can observe is one of the variants of [`GatewayError`].
//! Retryability is derived from the variant and, for API errors, the HTTP status,
//! so two errors with the same kind and status always agree on whether a repeat
//! attempt makes sense.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// HTTP statuses that indicate a transient remote failure
pub const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Rolling quota window that rejected a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaWindow {
    /// Trailing 60 seconds
    Minute,
    /// Trailing 3600 seconds
    Hour,
    /// Trailing 86400 seconds
    Day,
}

impl QuotaWindow {
    /// All windows, in the order they are reported
    pub const ALL: [Self; 3] = [Self::Minute, Self::Hour, Self::Day];

    /// Width of the window
    #[must_use]
    pub const fn width(self) -> Duration {
        match self {
            Self::Minute => Duration::from_secs(60),
            Self::Hour => Duration::from_secs(3_600),
            Self::Day => Duration::from_secs(86_400),
        }
    }

    /// Lowercase name used in logs and serialized stats
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
        }
    }
}

impl fmt::Display for QuotaWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fieldless discriminant of [`GatewayError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No response within the configured deadline
    Timeout,
    /// Local admission control rejected the call
    RateLimitExceeded,
    /// Remote responded with a non-2xx status
    Api,
    /// Request never reached the server or no response was received
    Network,
    /// Malformed request detected before sending
    Validation,
    /// Client is misconfigured
    Configuration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Timeout => "timeout",
            Self::RateLimitExceeded => "rate_limit_exceeded",
            Self::Api => "api",
            Self::Network => "network",
            Self::Validation => "validation",
            Self::Configuration => "configuration",
        };
        f.write_str(name)
    }
}

/// A classified gateway failure
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GatewayError {
    /// No response within the deadline
    #[error("Request timed out after {}ms: {message}", .timeout.as_millis())]
    Timeout {
        /// Deadline that expired
        #[serde(with = "duration_millis")]
        timeout: Duration,
        /// What timed out
        message: String,
    },

    /// Local admission rejected the call
    #[error("Rate limit exceeded for {window} window, retry in {}ms", .retry_after.as_millis())]
    RateLimitExceeded {
        /// Window whose quota was breached
        window: QuotaWindow,
        /// Configured limit of that window
        limit: u32,
        /// Time until a slot in that window frees up
        #[serde(with = "duration_millis")]
        retry_after: Duration,
    },

    /// Remote responded with a non-2xx status
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Provider error message
        message: String,
        /// Server-provided wait hint (`Retry-After` or rate-limit reset)
        #[serde(
            default,
            with = "option_duration_millis",
            skip_serializing_if = "Option::is_none"
        )]
        retry_after: Option<Duration>,
        /// Provider identifier
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider: Option<String>,
    },

    /// No response object was received
    #[error("Network error: {message}")]
    Network {
        /// Transport failure description
        message: String,
    },

    /// Request rejected before sending
    #[error("Validation error: {message}")]
    Validation {
        /// What is wrong
        message: String,
        /// Offending field, if any
        #[serde(default, skip_serializing_if = "Option::is_none")]
        field: Option<String>,
    },

    /// Client misconfigured
    #[error("Configuration error: {message}")]
    Configuration {
        /// What is misconfigured
        message: String,
    },
}

impl GatewayError {
    /// Create a timeout error
    #[must_use]
    pub fn timeout(timeout: Duration, message: impl Into<String>) -> Self {
        Self::Timeout {
            timeout,
            message: message.into(),
        }
    }

    /// Create a local rate limit rejection
    #[must_use]
    pub fn rate_limit_exceeded(window: QuotaWindow, limit: u32, retry_after: Duration) -> Self {
        Self::RateLimitExceeded {
            window,
            limit,
            retry_after,
        }
    }

    /// Create an API error
    #[must_use]
    pub fn api(status: u16, message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self::Api {
            status,
            message: message.into(),
            retry_after,
            provider: None,
        }
    }

    /// Create a network error
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a validation error
    #[must_use]
    pub fn validation(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::Validation {
            message: message.into(),
            field: field.map(str::to_string),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Attach the provider id to an API error; other kinds are returned unchanged
    #[must_use]
    pub fn with_provider(self, provider_id: impl Into<String>) -> Self {
        match self {
            Self::Api {
                status,
                message,
                retry_after,
                ..
            } => Self::Api {
                status,
                message,
                retry_after,
                provider: Some(provider_id.into()),
            },
            other => other,
        }
    }

    /// Kind of this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::RateLimitExceeded { .. } => ErrorKind::RateLimitExceeded,
            Self::Api { .. } => ErrorKind::Api,
            Self::Network { .. } => ErrorKind::Network,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Configuration { .. } => ErrorKind::Configuration,
        }
    }

    /// HTTP status associated with this error
    #[must_use]
    pub const fn http_status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether a repeat attempt may succeed
    ///
    /// Local rate limit rejections are never retryable; a remote 429 is an
    /// [`GatewayError::Api`] error and follows the status table.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Network { .. } => true,
            Self::Api { status, .. } => RETRYABLE_STATUSES.contains(status),
            Self::RateLimitExceeded { .. }
            | Self::Validation { .. }
            | Self::Configuration { .. } => false,
        }
    }

    /// Explicit wait hint carried by the error
    ///
    /// For local rejections this is the time until the breached window frees a
    /// slot; for API errors it is the server's `Retry-After`.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimitExceeded { retry_after, .. } => Some(*retry_after),
            Self::Api { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod option_duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|v| v.map(Duration::from_millis))
    }
}
