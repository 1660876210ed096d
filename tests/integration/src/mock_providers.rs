//! Mock completion API for integration testing
//!
//! A wiremock server that speaks the `/chat/completions` protocol.

use crate::fixtures::{chat_completion_body, empty_completion_body, error_body, TEST_API_KEY};
use serde_json::Value;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path every completion is posted to
pub const COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Mock completion API server
pub struct MockCompletionApi {
    pub server: MockServer,
}

impl MockCompletionApi {
    /// Start a new mock server
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL to configure the client with
    pub fn base_url(&self) -> String {
        format!("{}/v1", self.server.uri())
    }

    /// Number of completion calls received so far
    pub async fn calls(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map_or(0, |requests| requests.len())
    }

    /// JSON bodies of every completion call received so far
    pub async fn request_bodies(&self) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter_map(|request| serde_json::from_slice(&request.body).ok())
            .collect()
    }

    fn completions() -> wiremock::MockBuilder {
        Mock::given(method("POST"))
            .and(path(COMPLETIONS_PATH))
            .and(header("authorization", format!("Bearer {TEST_API_KEY}").as_str()))
    }

    /// Answer every call with `content`
    pub async fn mock_completion(&self, content: &str) {
        Self::completions()
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion_body(content)))
            .mount(&self.server)
            .await;
    }

    /// Answer every call with `content`, expecting exactly `times` calls
    pub async fn mock_completion_expect(&self, content: &str, times: u64) {
        Self::completions()
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion_body(content)))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Answer every call with a body that has no choices
    pub async fn mock_empty_completion(&self) {
        Self::completions()
            .respond_with(ResponseTemplate::new(200).set_body_json(empty_completion_body()))
            .mount(&self.server)
            .await;
    }

    /// Answer after a delay
    pub async fn mock_completion_delayed(&self, content: &str, delay: Duration) {
        Self::completions()
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(chat_completion_body(content))
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    /// Fail every call with `status`, expecting exactly `times` calls
    pub async fn mock_status_expect(&self, status: u16, times: u64) {
        Self::completions()
            .respond_with(
                ResponseTemplate::new(status).set_body_json(error_body("server_error", "boom")),
            )
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Fail every call with an authentication error
    pub async fn mock_auth_error(&self) {
        Self::completions()
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(error_body("invalid_api_key", "Incorrect API key provided")),
            )
            .mount(&self.server)
            .await;
    }

    /// Return 429 with `retry-after` for the first `times` calls
    pub async fn mock_rate_limited(&self, times: u64, retry_after: &str) {
        Self::completions()
            .respond_with(
                ResponseTemplate::new(429)
                    .set_body_json(error_body("rate_limit_exceeded", "Rate limit reached"))
                    .append_header("retry-after", retry_after),
            )
            .up_to_n_times(times)
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Fail the first `fail_count` calls with 503, then succeed
    pub async fn mock_flaky(&self, fail_count: u64, content: &str) {
        Self::completions()
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream overloaded"))
            .up_to_n_times(fail_count)
            .expect(fail_count)
            .mount(&self.server)
            .await;

        self.mock_completion(content).await;
    }

    /// Answer with a body that is not a completion
    pub async fn mock_garbage(&self) {
        Self::completions()
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&self.server)
            .await;
    }
}
