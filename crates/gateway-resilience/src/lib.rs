//! # Gateway Resilience
//!
//! Admission control, caching and retry for the completion gateway:
//! - Sliding-window rate limiter over minute, hour and day quotas
//! - TTL response cache keyed by a canonical request fingerprint
//! - Retry policy driven by the error taxonomy

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod rate_limiter;
pub mod response_cache;
pub mod retry;

// Re-export main types
pub use rate_limiter::{PerWindow, RateLimiter, RateLimiterStats, RateLimits};
pub use response_cache::{CacheConfig, CacheKey, CacheStats, ResponseCache};
pub use retry::{
    BackoffTable, RetryAttempt, RetryConfig, RetryDecision, RetryPolicy, RetryPolicyBuilder,
    RetryResult,
};
