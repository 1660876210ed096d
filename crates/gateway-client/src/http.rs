//! OpenAI-compatible HTTP completion provider.

use crate::config::ClientConfig;
use async_trait::async_trait;
use gateway_core::{
    CompletionProvider, GatewayError, GatewayResult, ProviderCompletion, ProviderRequest,
    TransportError, Usage,
};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER, USER_AGENT};
use serde::Deserialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, instrument};
use url::Url;

/// Header carrying the quota reset time on 429 responses
const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

/// Reset values above this are absolute unix timestamps, below it relative seconds
const UNIX_TIMESTAMP_THRESHOLD: f64 = 1e9;

/// Server wait hints longer than this are ignored
const MAX_RETRY_HINT: Duration = Duration::from_secs(86_400);

/// Provider that posts to `{base_url}/chat/completions`.
#[derive(Clone)]
pub struct HttpCompletionProvider {
    http: reqwest::Client,
    endpoint: Url,
    config: ClientConfig,
}

impl HttpCompletionProvider {
    /// Create a provider with the given configuration.
    pub fn new(config: ClientConfig) -> GatewayResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| GatewayError::configuration(format!("Invalid user agent: {e}")))?,
        );

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key_value()))
            .map_err(|e| GatewayError::configuration(format!("Invalid API key: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| GatewayError::configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: config.completions_url()?,
            config,
        })
    }

    /// Get the provider configuration.
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Map a reqwest error to a transport failure.
    fn map_reqwest_error(&self, error: &reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout(self.config.timeout)
        } else {
            TransportError::Connect(error.to_string())
        }
    }

    /// Read a non-2xx response into a transport failure.
    async fn error_response(response: reqwest::Response) -> TransportError {
        let status = response.status().as_u16();
        let retry_after = retry_hint(status, response.headers(), unix_now());

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body).unwrap_or_else(|| format!("HTTP {status}"));

        TransportError::Status {
            status,
            message,
            retry_after,
        }
    }
}

#[async_trait]
impl CompletionProvider for HttpCompletionProvider {
    fn id(&self) -> &str {
        &self.config.provider_id
    }

    #[instrument(skip(self, request), fields(provider = %self.config.provider_id, model = %request.model))]
    async fn complete(
        &self,
        request: &ProviderRequest,
    ) -> Result<ProviderCompletion, TransportError> {
        debug!(endpoint = %self.endpoint, "Sending completion request");

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::error_response(response).await);
        }

        let body: ChatCompletionBody = response.json().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.config.timeout)
            } else {
                TransportError::Decode {
                    status: status.as_u16(),
                    message: e.to_string(),
                }
            }
        })?;

        Ok(body.into_completion())
    }
}

impl std::fmt::Debug for HttpCompletionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCompletionProvider")
            .field("provider_id", &self.config.provider_id)
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

/// Success body of `/chat/completions`
#[derive(Debug, Deserialize)]
struct ChatCompletionBody {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    created: i64,
    #[serde(default)]
    choices: Vec<ChoiceBody>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceBody {
    message: Option<MessageBody>,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionBody {
    fn into_completion(self) -> ProviderCompletion {
        let content = self
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .unwrap_or_default();

        ProviderCompletion {
            id: self.id,
            model: self.model,
            created: self.created,
            content,
            usage: self.usage.unwrap_or_default(),
        }
    }
}

/// Error bodies seen in the wild
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Nested { error: ErrorDetail },
    Flat { message: String },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Object { message: String },
    Text(String),
}

/// Provider message from an error body: `{"error":{"message"}}`, `{"message"}`
/// or the raw text
fn error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody::Nested {
            error: ErrorDetail::Object { message } | ErrorDetail::Text(message),
        })
        | Ok(ErrorBody::Flat { message }) => Some(message),
        Err(_) => Some(body.to_string()),
    }
}

/// Wait hint from `retry-after`, or from `x-ratelimit-reset` on a 429
fn retry_hint(status: u16, headers: &HeaderMap, now_unix: f64) -> Option<Duration> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<f64>().ok())
            .filter(|value| value.is_finite() && *value >= 0.0)
    };

    if let Some(seconds) = header(RETRY_AFTER.as_str()) {
        return hint_duration(seconds);
    }

    if status == 429 {
        if let Some(reset) = header(RATE_LIMIT_RESET) {
            let seconds = if reset > UNIX_TIMESTAMP_THRESHOLD {
                (reset - now_unix).max(0.0)
            } else {
                reset
            };
            return hint_duration(seconds);
        }
    }

    None
}

/// `None` for values that overflow `Duration` or exceed [`MAX_RETRY_HINT`]
fn hint_duration(seconds: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(seconds)
        .ok()
        .filter(|hint| *hint <= MAX_RETRY_HINT)
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |elapsed| elapsed.as_secs_f64())
}
