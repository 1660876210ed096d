//! Retry policy driven by the error taxonomy.
//!
//! Backoff is linear in the attempt number. An explicit `retry_after` carried
//! by the error always wins over the table.

use gateway_core::{ErrorKind, GatewayError, GatewayResult};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Base backoff per error kind and HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffTable {
    /// Attempt deadline exceeded
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Request never reached the server
    #[serde(with = "humantime_serde")]
    pub network: Duration,
    /// HTTP 408
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// HTTP 429 without a retry hint
    #[serde(with = "humantime_serde")]
    pub too_many_requests: Duration,
    /// HTTP 500
    #[serde(with = "humantime_serde")]
    pub internal_error: Duration,
    /// HTTP 502
    #[serde(with = "humantime_serde")]
    pub bad_gateway: Duration,
    /// HTTP 503
    #[serde(with = "humantime_serde")]
    pub service_unavailable: Duration,
    /// HTTP 504
    #[serde(with = "humantime_serde")]
    pub gateway_timeout: Duration,
    /// Any other status
    #[serde(with = "humantime_serde")]
    pub other_status: Duration,
}

impl Default for BackoffTable {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            network: Duration::from_secs(1),
            request_timeout: Duration::from_secs(2),
            too_many_requests: Duration::from_secs(60),
            internal_error: Duration::from_secs(5),
            bad_gateway: Duration::from_secs(10),
            service_unavailable: Duration::from_secs(30),
            gateway_timeout: Duration::from_secs(10),
            other_status: Duration::from_secs(1),
        }
    }
}

impl BackoffTable {
    /// Same base delay for every entry
    #[must_use]
    pub const fn uniform(delay: Duration) -> Self {
        Self {
            timeout: delay,
            network: delay,
            request_timeout: delay,
            too_many_requests: delay,
            internal_error: delay,
            bad_gateway: delay,
            service_unavailable: delay,
            gateway_timeout: delay,
            other_status: delay,
        }
    }

    /// Base delay for an HTTP status
    #[must_use]
    pub const fn for_status(&self, status: u16) -> Duration {
        match status {
            408 => self.request_timeout,
            429 => self.too_many_requests,
            500 => self.internal_error,
            502 => self.bad_gateway,
            503 => self.service_unavailable,
            504 => self.gateway_timeout,
            _ => self.other_status,
        }
    }

    /// Base delay for a classified error, ignoring any `retry_after`
    #[must_use]
    pub const fn base_delay(&self, error: &GatewayError) -> Duration {
        match error {
            GatewayError::Timeout { .. } => self.timeout,
            GatewayError::Network { .. } => self.network,
            GatewayError::Api { status, .. } => self.for_status(*status),
            GatewayError::RateLimitExceeded { retry_after, .. } => *retry_after,
            GatewayError::Validation { .. } | GatewayError::Configuration { .. } => Duration::ZERO,
        }
    }
}

/// Retry configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Base delays
    pub backoff: BackoffTable,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffTable::default(),
        }
    }
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then try again
    Retry(Duration),
    /// Give up and surface the error
    Stop,
}

/// State of a call that is about to be retried
#[derive(Debug, Clone)]
pub struct RetryAttempt {
    /// Attempt that just failed (1-based)
    pub attempt_number: u32,
    /// Attempt ceiling
    pub max_attempts: u32,
    /// Failure of that attempt
    pub last_error: GatewayError,
}

/// Retry policy implementation
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Create a new retry policy; a ceiling of 0 is treated as 1
    #[must_use]
    pub fn new(mut config: RetryConfig) -> Self {
        config.max_attempts = config.max_attempts.max(1);
        Self { config }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Create a policy with a custom attempt ceiling
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self::new(RetryConfig {
            max_attempts,
            ..Default::default()
        })
    }

    /// Get the configuration
    #[must_use]
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Decide what follows failed attempt `attempt` (1-based)
    #[must_use]
    pub fn next_delay(&self, attempt: u32, error: &GatewayError) -> RetryDecision {
        if !error.is_retryable() || attempt >= self.config.max_attempts {
            return RetryDecision::Stop;
        }

        let delay = error
            .retry_after()
            .unwrap_or_else(|| self.config.backoff.base_delay(error).saturating_mul(attempt));
        RetryDecision::Retry(delay)
    }

    /// Execute an operation with retry logic
    ///
    /// # Errors
    /// Returns the last error once retries stop
    pub async fn execute<F, Fut, T>(&self, operation: F) -> GatewayResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        self.run(operation, |_, _| {}).await.into_result()
    }

    /// Execute an operation, reporting every scheduled retry to `on_retry`
    ///
    /// The operation receives the 1-based attempt number. The final error is
    /// returned unmodified.
    pub async fn run<F, Fut, T, O>(&self, mut operation: F, mut on_retry: O) -> RetryResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
        O: FnMut(&RetryAttempt, Duration),
    {
        let mut attempt = 1;

        loop {
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt = attempt, "Retry succeeded");
                    }
                    return RetryResult::Success {
                        value,
                        attempts: attempt,
                    };
                }
                Err(error) => match self.next_delay(attempt, &error) {
                    RetryDecision::Stop if error.is_retryable() => {
                        return RetryResult::Exhausted {
                            error,
                            attempts: attempt,
                        };
                    }
                    RetryDecision::Stop => {
                        return RetryResult::NonRetryable {
                            error,
                            attempts: attempt,
                        };
                    }
                    RetryDecision::Retry(delay) => {
                        warn!(
                            attempt = attempt,
                            max_attempts = self.config.max_attempts,
                            kind = %error.kind(),
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "Retrying after error"
                        );

                        let state = RetryAttempt {
                            attempt_number: attempt,
                            max_attempts: self.config.max_attempts,
                            last_error: error,
                        };
                        on_retry(&state, delay);

                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                },
            }
        }
    }
}

/// Result of a retried operation
#[derive(Debug)]
pub enum RetryResult<T> {
    /// Operation succeeded
    Success {
        /// Produced value
        value: T,
        /// Attempts used
        attempts: u32,
    },
    /// Retryable failures used up every attempt
    Exhausted {
        /// The final error
        error: GatewayError,
        /// Attempts used
        attempts: u32,
    },
    /// Operation failed with a non-retryable error
    NonRetryable {
        /// The error
        error: GatewayError,
        /// Attempts used
        attempts: u32,
    },
}

impl<T> RetryResult<T> {
    /// Convert to a Result
    ///
    /// # Errors
    /// Returns the error if the operation failed
    pub fn into_result(self) -> GatewayResult<T> {
        match self {
            Self::Success { value, .. } => Ok(value),
            Self::Exhausted { error, .. } | Self::NonRetryable { error, .. } => Err(error),
        }
    }

    /// Attempts used
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. }
            | Self::Exhausted { attempts, .. }
            | Self::NonRetryable { attempts, .. } => *attempts,
        }
    }

    /// Kind of the final error, if any
    #[must_use]
    pub const fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Exhausted { error, .. } | Self::NonRetryable { error, .. } => Some(error.kind()),
        }
    }

    /// Check if the operation succeeded
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Builder for retry policy
#[derive(Debug, Default)]
pub struct RetryPolicyBuilder {
    config: RetryConfig,
}

impl RetryPolicyBuilder {
    /// Create a new builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the attempt ceiling
    #[must_use]
    pub const fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n;
        self
    }

    /// Replace the backoff table
    #[must_use]
    pub const fn backoff(mut self, backoff: BackoffTable) -> Self {
        self.config.backoff = backoff;
        self
    }

    /// Build the policy
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        RetryPolicy::new(self.config)
    }
}
