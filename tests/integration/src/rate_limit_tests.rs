//! Rate limiting integration tests

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_providers::MockCompletionApi;
use gateway_core::{ErrorKind, GatewayError, QuotaWindow};
use gateway_resilience::RateLimits;
use std::time::Duration;

/// Test the third call within a minute is rejected locally
#[tokio::test]
async fn test_minute_quota() {
    let api = MockCompletionApi::start().await;
    api.mock_completion_expect("ok", 2).await;
    let client = client_with(&api, |config| {
        config.rate_limits = RateLimits::new(2, 1_000, 10_000);
    });

    client.call(simple_request("one")).await.expect("first");
    client.call(simple_request("two")).await.expect("second");
    let err = client
        .call(simple_request("three"))
        .await
        .expect_err("over quota");

    match err {
        GatewayError::RateLimitExceeded {
            window,
            limit,
            retry_after,
        } => {
            assert_eq!(window, QuotaWindow::Minute);
            assert_eq!(limit, 2);
            assert!(retry_after <= Duration::from_secs(60));
            assert!(retry_after > Duration::from_secs(55));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!GatewayError::rate_limit_exceeded(QuotaWindow::Minute, 2, Duration::ZERO).is_retryable());

    api.server.verify().await;
}

/// Test the hour window rejects independently of the minute window
#[tokio::test]
async fn test_hour_quota_independent() {
    let api = MockCompletionApi::start().await;
    api.mock_completion("ok").await;
    let client = client_with(&api, |config| {
        config.rate_limits = RateLimits::new(1_000, 2, 1_000);
    });

    client.call(simple_request("one")).await.expect("first");
    client.call(simple_request("two")).await.expect("second");
    let err = client
        .call(simple_request("three"))
        .await
        .expect_err("hour quota");

    assert!(matches!(
        err,
        GatewayError::RateLimitExceeded {
            window: QuotaWindow::Hour,
            ..
        }
    ));
    assert_eq!(api.calls().await, 2);
}

/// Test rejected calls show up in the stats
#[tokio::test]
async fn test_stats_after_rejection() {
    let api = MockCompletionApi::start().await;
    api.mock_completion("ok").await;
    let client = client_with(&api, |config| {
        config.rate_limits = RateLimits::new(1, 10, 100);
    });

    client.call(simple_request("one")).await.expect("first");
    let _ = client.call(simple_request("two")).await;

    let stats = client.stats().rate_limiter;
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.rejected_requests, 1);
    assert_eq!(stats.current_usage.minute, 1);
    assert!((stats.usage_percentages.hour - 10.0).abs() < 1e-9);
    assert!(client.next_available_hint().is_some());
}

/// Test a retried call occupies a single quota slot
#[tokio::test]
async fn test_retries_do_not_consume_quota() {
    let api = MockCompletionApi::start().await;
    api.mock_flaky(2, "eventually").await;
    let client = client_with(&api, |config| {
        config.rate_limits = RateLimits::new(1, 10, 100);
    });

    client
        .call(simple_request("Hello"))
        .await
        .expect("succeeds on third attempt");

    assert_eq!(api.calls().await, 3);
    assert_eq!(client.stats().rate_limiter.total_requests, 1);
}

/// Test concurrent batch admission never exceeds the quota
#[tokio::test]
async fn test_batch_respects_quota() {
    let api = MockCompletionApi::start().await;
    api.mock_completion("ok").await;
    let client = client_with(&api, |config| {
        config.rate_limits = RateLimits::new(5, 100, 1_000);
        config.batch.concurrency = 8;
    });

    let requests = (0..12).map(|i| simple_request(&format!("prompt {i}"))).collect();
    let results = client.call_batch(requests).await;

    let admitted = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(e) if e.kind() == ErrorKind::RateLimitExceeded))
        .count();

    assert_eq!(admitted, 5);
    assert_eq!(rejected, 7);
    assert_eq!(api.calls().await, 5);
}

/// Test resetting the limiter admits calls again
#[tokio::test]
async fn test_reset_rate_limiter() {
    let api = MockCompletionApi::start().await;
    api.mock_completion("ok").await;
    let client = client_with(&api, |config| {
        config.rate_limits = RateLimits::new(1, 10, 100);
    });

    client.call(simple_request("one")).await.expect("first");
    assert!(client.call(simple_request("two")).await.is_err());

    client.reset_rate_limiter();
    client.call(simple_request("two")).await.expect("admitted after reset");
    assert_eq!(client.stats().rate_limiter.rejected_requests, 1);
}
