//! Helper functions for integration tests

use crate::fixtures::{TEST_API_KEY, TEST_MODEL};
use crate::mock_providers::MockCompletionApi;
use gateway_client::{GatewayClient, GatewayClientBuilder};
use gateway_config::GatewayConfig;
use gateway_core::EventSink;
use gateway_resilience::BackoffTable;
use secrecy::Secret;
use std::time::Duration;

/// Configuration pointing at the mock API, with millisecond backoff
pub fn test_config(api: &MockCompletionApi) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.provider.id = "mock-openai".to_string();
    config.provider.base_url = api.base_url();
    config.provider.api_key = Some(Secret::new(TEST_API_KEY.to_string()));
    config.provider.model = TEST_MODEL.to_string();
    config.provider.request_timeout = Duration::from_secs(5);
    config.retry.backoff = BackoffTable::uniform(Duration::from_millis(10));
    config
}

/// Client built from [`test_config`]
pub fn test_client(api: &MockCompletionApi) -> GatewayClient {
    client_with(api, |_| {})
}

/// Client built from [`test_config`] after `adjust` has modified it
pub fn client_with(api: &MockCompletionApi, adjust: impl FnOnce(&mut GatewayConfig)) -> GatewayClient {
    let mut config = test_config(api);
    adjust(&mut config);
    GatewayClient::from_config(&config).expect("valid test client")
}

/// Client that also publishes events to `sink`
pub fn client_with_events(api: &MockCompletionApi, sink: EventSink) -> GatewayClient {
    GatewayClientBuilder::from_config(&test_config(api))
        .expect("valid test config")
        .events(sink)
        .build()
        .expect("valid test client")
}
