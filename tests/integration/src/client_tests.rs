//! End-to-end client tests against the mock completion API

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_providers::MockCompletionApi;
use gateway_core::{event_channel, ErrorKind, GatewayError, GatewayEvent};
use std::time::Duration;

/// Test a successful call is normalized into the response envelope
#[tokio::test]
async fn test_successful_completion() {
    let api = MockCompletionApi::start().await;
    api.mock_completion("Hello there!").await;
    let client = test_client(&api);

    let response = client
        .call(simple_request("Hello"))
        .await
        .expect("call succeeds");

    assert_eq!(response.content, "Hello there!");
    assert_eq!(response.id, "chatcmpl-test123");
    assert_eq!(response.model, TEST_MODEL);
    assert_eq!(response.provider, "mock-openai");
    assert_eq!(response.usage.total_tokens, 30);
    assert_eq!(response.created.timestamp(), 1_700_000_000);
}

/// Test the outbound body carries resolved parameters and never streams
#[tokio::test]
async fn test_request_body_shape() {
    let api = MockCompletionApi::start().await;
    api.mock_completion("ok").await;
    let client = test_client(&api);

    client
        .call(detailed_request("Be terse", "Summarize Rust"))
        .await
        .expect("call succeeds");
    client
        .call(conversation_request())
        .await
        .expect("call succeeds");

    let bodies = api.request_bodies().await;
    assert_eq!(bodies.len(), 2);

    let detailed = &bodies[0];
    assert_eq!(detailed["model"], TEST_MODEL);
    assert_eq!(detailed["system"], "Be terse");
    assert_eq!(detailed["max_tokens"], 128);
    assert_eq!(detailed["stream"], false);
    assert_eq!(detailed["messages"][0]["role"], "user");

    let conversation = &bodies[1];
    assert_eq!(conversation["messages"].as_array().map(Vec::len), Some(3));
    assert_eq!(conversation["max_tokens"], 1024);
    assert!(conversation.get("system").is_none());
}

/// Test a persistent 500 is attempted exactly max_attempts times
#[tokio::test]
async fn test_server_error_exhausts_retries() {
    let api = MockCompletionApi::start().await;
    api.mock_status_expect(500, 3).await;
    let client = client_with(&api, |config| config.retry.max_attempts = 3);

    let err = client
        .call(simple_request("Hello"))
        .await
        .expect_err("always fails");

    assert!(matches!(err, GatewayError::Api { status: 500, ref message, .. } if message == "boom"));
    assert_eq!(api.calls().await, 3);
    api.server.verify().await;
}

/// Test transient 503s are retried until success
#[tokio::test]
async fn test_flaky_endpoint_recovers() {
    let api = MockCompletionApi::start().await;
    api.mock_flaky(2, "Success after retries").await;
    let client = test_client(&api);

    let response = client
        .call(simple_request("Hello"))
        .await
        .expect("third attempt succeeds");

    assert_eq!(response.content, "Success after retries");
    assert_eq!(api.calls().await, 3);
}

/// Test a remote 429 honours Retry-After and is retried
#[tokio::test]
async fn test_remote_rate_limit_is_retried() {
    let api = MockCompletionApi::start().await;
    api.mock_rate_limited(1, "0").await;
    api.mock_completion("after the wait").await;

    let (sink, mut events) = event_channel();
    let client = client_with_events(&api, sink);

    let response = client
        .call(simple_request("Hello"))
        .await
        .expect("retried after 429");
    assert_eq!(response.content, "after the wait");

    let mut retry_delay = None;
    while let Ok(event) = events.try_recv() {
        if let GatewayEvent::RetryScheduled { delay_ms, kind, .. } = event {
            assert_eq!(kind, ErrorKind::Api);
            retry_delay = Some(delay_ms);
        }
    }
    assert_eq!(retry_delay, Some(0));
}

/// Test authentication failures are not retried
#[tokio::test]
async fn test_auth_error_not_retried() {
    let api = MockCompletionApi::start().await;
    api.mock_auth_error().await;
    let client = test_client(&api);

    let err = client
        .call(simple_request("Hello"))
        .await
        .expect_err("unauthorized");

    assert_eq!(err.http_status(), Some(401));
    assert!(err.to_string().contains("Incorrect API key provided"));
    assert_eq!(api.calls().await, 1);
}

/// Test an attempt that outlives the request timeout becomes a Timeout error
#[tokio::test]
async fn test_request_timeout() {
    let api = MockCompletionApi::start().await;
    api.mock_completion_delayed("too late", Duration::from_secs(2)).await;
    let client = client_with(&api, |config| {
        config.provider.request_timeout = Duration::from_millis(200);
        config.retry.max_attempts = 2;
    });

    let err = client
        .call(simple_request("Hello"))
        .await
        .expect_err("times out");

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(api.calls().await, 2);
}

/// Test an unreachable server surfaces as a Network error
#[tokio::test]
async fn test_connection_refused() {
    let api = MockCompletionApi::start().await;
    let mut config = test_config(&api);
    config.provider.base_url = "http://127.0.0.1:9/v1".to_string();
    config.retry.max_attempts = 2;
    let client = gateway_client::GatewayClient::from_config(&config).expect("client");

    let err = client
        .call(simple_request("Hello"))
        .await
        .expect_err("nothing listens");

    assert_eq!(err.kind(), ErrorKind::Network);
}

/// Test an undecodable body is reported as an API error without retries
#[tokio::test]
async fn test_garbage_body() {
    let api = MockCompletionApi::start().await;
    api.mock_garbage().await;
    let client = test_client(&api);

    let err = client
        .call(simple_request("Hello"))
        .await
        .expect_err("not json");

    assert_eq!(err.http_status(), Some(200));
    assert_eq!(api.calls().await, 1);
}

/// Test validation failures never reach the server
#[tokio::test]
async fn test_invalid_request_never_sent() {
    let api = MockCompletionApi::start().await;
    api.mock_completion("unused").await;
    let client = test_client(&api);

    let mut request = simple_request("Hello");
    request.temperature = Some(3.5);
    let err = client.call(request).await.expect_err("invalid");

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(api.calls().await, 0);
}

/// Test batch results keep input order and isolate failures
#[tokio::test]
async fn test_batch_isolation() {
    let api = MockCompletionApi::start().await;
    api.mock_completion("fine").await;
    let client = test_client(&api);

    let results = client
        .call_batch(vec![
            simple_request("first"),
            simple_request("   "),
            simple_request("third"),
        ])
        .await;

    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert_eq!(
        results[1].as_ref().expect_err("blank prompt").kind(),
        ErrorKind::Validation
    );
    assert!(results[2].is_ok());
    assert_eq!(api.calls().await, 2);
}

/// Test a client without an API key is a configuration error
#[tokio::test]
async fn test_missing_api_key() {
    let api = MockCompletionApi::start().await;
    let mut config = test_config(&api);
    config.provider.api_key = None;

    let err = gateway_client::GatewayClient::from_config(&config).expect_err("no key");
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

/// Test a client built from a YAML file on disk
#[tokio::test]
async fn test_client_from_yaml_file() {
    let api = MockCompletionApi::start().await;
    api.mock_completion("from yaml").await;

    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("gateway.yaml");
    let yaml = format!(
        "provider:\n  id: yaml-provider\n  base_url: {}\n  api_key: {TEST_API_KEY}\n  model: {TEST_MODEL}\n  request_timeout: 5s\nrate_limits:\n  per_minute: 5\nretry:\n  max_attempts: 2\n",
        api.base_url()
    );
    std::fs::write(&path, yaml).expect("write config");

    let config = gateway_config::load_config_with(&path, |_| None)
        .await
        .expect("load");
    assert_eq!(config.rate_limits.per_minute, 5);
    assert_eq!(config.rate_limits.per_hour, 1_000);

    let client = gateway_client::GatewayClient::from_config(&config).expect("client");
    let response = client.call(simple_request("Hello")).await.expect("call");

    assert_eq!(response.content, "from yaml");
    assert_eq!(response.provider, "yaml-provider");
}

/// Test an absurd Retry-After falls back to the backoff table
#[tokio::test]
async fn test_oversized_retry_after_in_batch() {
    let api = MockCompletionApi::start().await;
    api.mock_rate_limited(1, "1e20").await;
    api.mock_completion("recovered").await;
    let client = test_client(&api);

    let results = client
        .call_batch(vec![simple_request("first"), simple_request("second")])
        .await;

    assert_eq!(results.len(), 2);
    for result in &results {
        assert_eq!(result.as_ref().expect("retried").content, "recovered");
    }
    assert_eq!(api.calls().await, 3);
}
