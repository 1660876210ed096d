//! Caching behavior integration tests

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_providers::MockCompletionApi;
use gateway_core::{event_channel, CompletionRequest, GatewayEvent};
use gateway_resilience::RateLimits;
use std::time::Duration;

/// Test identical requests are served from the cache
#[tokio::test]
async fn test_identical_requests_hit_cache() {
    let api = MockCompletionApi::start().await;
    api.mock_completion_expect("cached answer", 1).await;
    let client = test_client(&api);

    let first = client.call(simple_request("Hello")).await.expect("first");
    let second = client.call(simple_request("Hello")).await.expect("second");

    assert_eq!(first, second);
    let stats = client.stats().cache;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.sets, 1);
    assert!((stats.hit_rate - 0.5).abs() < 1e-9);

    api.server.verify().await;
}

/// Test explicit defaults and omitted fields share a cache entry
#[tokio::test]
async fn test_defaults_resolved_before_keying() {
    let api = MockCompletionApi::start().await;
    api.mock_completion_expect("answer", 1).await;
    let client = test_client(&api);

    client.call(simple_request("Hello")).await.expect("first");

    let explicit = CompletionRequest::builder()
        .user_message("Hello")
        .temperature(0.7)
        .max_tokens(1024)
        .top_p(1.0)
        .id("another-id")
        .build()
        .expect("valid");
    client.call(explicit).await.expect("cache hit");

    api.server.verify().await;
}

/// Test differing sampling parameters miss the cache
#[tokio::test]
async fn test_parameters_change_key() {
    let api = MockCompletionApi::start().await;
    api.mock_completion_expect("answer", 2).await;
    let client = test_client(&api);

    let mut warm = simple_request("Hello");
    warm.temperature = Some(0.7);
    let mut warmer = simple_request("Hello");
    warmer.temperature = Some(0.71);

    client.call(warm).await.expect("first");
    client.call(warmer).await.expect("second");

    api.server.verify().await;
}

/// Test cache hits succeed even when the quota is exhausted
#[tokio::test]
async fn test_cache_hit_bypasses_limiter() {
    let api = MockCompletionApi::start().await;
    api.mock_completion("answer").await;
    let client = client_with(&api, |config| {
        config.rate_limits = RateLimits::new(1, 10, 100);
    });

    client.call(simple_request("Hello")).await.expect("first");
    for _ in 0..3 {
        client.call(simple_request("Hello")).await.expect("cached");
    }

    let stats = client.stats();
    assert_eq!(stats.rate_limiter.total_requests, 1);
    assert_eq!(stats.rate_limiter.rejected_requests, 0);
    assert_eq!(stats.cache.hits, 3);
}

/// Test empty completions are returned but never cached
#[tokio::test]
async fn test_empty_completion_not_cached() {
    let api = MockCompletionApi::start().await;
    api.mock_empty_completion().await;
    let client = test_client(&api);

    let response = client.call(simple_request("Hello")).await.expect("first");
    assert!(response.content.is_empty());
    client.call(simple_request("Hello")).await.expect("second");

    assert_eq!(api.calls().await, 2);
    assert_eq!(client.stats().cache.sets, 0);
}

/// Test entries expire after their TTL
#[tokio::test]
async fn test_cache_ttl_expiry() {
    let api = MockCompletionApi::start().await;
    api.mock_completion("answer").await;
    let client = client_with(&api, |config| {
        config.cache.ttl = Duration::from_millis(300);
    });

    client.call(simple_request("Hello")).await.expect("first");
    client.call(simple_request("Hello")).await.expect("hit");
    tokio::time::sleep(Duration::from_millis(400)).await;
    client.call(simple_request("Hello")).await.expect("expired");

    assert_eq!(api.calls().await, 2);
    let stats = client.stats().cache;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.expirations, 1);
}

/// Test the background sweep reclaims expired entries
#[tokio::test]
async fn test_sweeper_reclaims_entries() {
    let api = MockCompletionApi::start().await;
    api.mock_completion("answer").await;
    let client = client_with(&api, |config| {
        config.cache.ttl = Duration::from_millis(50);
        config.cache.sweep_interval = Duration::from_millis(25);
    });

    client.call(simple_request("Hello")).await.expect("first");
    tokio::time::sleep(Duration::from_millis(300)).await;

    let stats = client.stats().cache;
    assert_eq!(stats.total_keys, 0);
    assert_eq!(stats.expirations, 1);
    assert_eq!(stats.misses, 1);
}

/// Test clearing the cache forces a remote call
#[tokio::test]
async fn test_clear_cache() {
    let api = MockCompletionApi::start().await;
    api.mock_completion_expect("answer", 2).await;
    let client = test_client(&api);

    client.call(simple_request("Hello")).await.expect("first");
    client.clear_cache();
    client.call(simple_request("Hello")).await.expect("second");

    api.server.verify().await;
}

/// Test cache hits and misses are published as events
#[tokio::test]
async fn test_cache_events() {
    let api = MockCompletionApi::start().await;
    api.mock_completion("answer").await;
    let (sink, mut events) = event_channel();
    let client = client_with_events(&api, sink);

    client.call(simple_request("Hello")).await.expect("first");
    client.call(simple_request("Hello")).await.expect("second");

    let mut misses = 0;
    let mut hits = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            GatewayEvent::CacheMiss { .. } => misses += 1,
            GatewayEvent::CacheHit { .. } => hits += 1,
            _ => {}
        }
    }
    assert_eq!((misses, hits), (1, 1));
}
