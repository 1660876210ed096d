//! Gateway client.
//!
//! Every call goes through validation, the response cache, local admission
//! control and the retry loop, in that order. Only the retry loop ever waits.

use crate::classify::classify;
use crate::config::ClientConfig;
use crate::http::HttpCompletionProvider;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use gateway_config::GatewayConfig;
use gateway_core::{
    CompletionProvider, CompletionRequest, CompletionResponse, EventSink, GatewayError,
    GatewayEvent, GatewayResult, ProviderCompletion, ProviderRequest, RequestDefaults,
    TransportError,
};
use gateway_resilience::{
    CacheConfig, CacheKey, CacheStats, RateLimiter, RateLimiterStats, RateLimits, ResponseCache,
    RetryConfig, RetryPolicy, RetryResult,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

/// Default number of batch items in flight at once
pub const DEFAULT_BATCH_CONCURRENCY: usize = 10;

/// Combined limiter and cache statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayStats {
    /// Rate limiter usage and counters
    pub rate_limiter: RateLimiterStats,
    /// Cache counters
    pub cache: CacheStats,
}

/// Quota-aware, caching, retrying completion client.
///
/// Cloning is cheap; clones share the limiter and the cache.
///
/// # Example
///
/// ```rust,no_run
/// use gateway_client::GatewayClient;
/// use gateway_core::CompletionRequest;
///
/// # async fn example(config: gateway_config::GatewayConfig) -> gateway_core::GatewayResult<()> {
/// let client = GatewayClient::from_config(&config)?;
/// let response = client.call(CompletionRequest::user("Hello!")).await?;
/// println!("{}", response.content);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct GatewayClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    provider: Arc<dyn CompletionProvider>,
    model: String,
    limiter: RateLimiter,
    cache: Arc<ResponseCache<CompletionResponse>>,
    cache_enabled: bool,
    retry: RetryPolicy,
    defaults: RequestDefaults,
    request_timeout: Duration,
    call_deadline: Option<Duration>,
    batch_concurrency: usize,
    events: Option<EventSink>,
    sweeper: Option<JoinHandle<()>>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
    }
}

impl GatewayClient {
    /// Create a new client builder around a provider.
    pub fn builder(provider: Arc<dyn CompletionProvider>) -> GatewayClientBuilder {
        GatewayClientBuilder::new(provider)
    }

    /// Build an HTTP-backed client from loaded configuration.
    ///
    /// Fails with a configuration error when no API key is set or the base
    /// URL does not parse.
    pub fn from_config(config: &GatewayConfig) -> GatewayResult<Self> {
        GatewayClientBuilder::from_config(config)?.build()
    }

    /// Complete one request.
    ///
    /// Cache hits consume no quota. A local rate limit rejection is returned
    /// immediately and never retried.
    pub async fn call(&self, request: CompletionRequest) -> GatewayResult<CompletionResponse> {
        let call_id = request
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let span = info_span!(
            "gateway_call",
            call_id = %call_id,
            provider = %self.inner.provider.id(),
        );

        self.call_inner(call_id, request).instrument(span).await
    }

    /// Complete many requests concurrently.
    ///
    /// Results are in input order. A failing item never affects its siblings.
    pub async fn call_batch(
        &self,
        requests: Vec<CompletionRequest>,
    ) -> Vec<GatewayResult<CompletionResponse>> {
        let total = requests.len();
        let results: Vec<_> = stream::iter(requests)
            .map(|request| self.call(request))
            .buffered(self.inner.batch_concurrency)
            .collect()
            .await;

        let failed = results.iter().filter(|result| result.is_err()).count();
        debug!(total = total, failed = failed, "Batch completed");
        results
    }

    /// Limiter and cache statistics.
    pub fn stats(&self) -> GatewayStats {
        GatewayStats {
            rate_limiter: self.inner.limiter.stats(),
            cache: self.inner.cache.stats(),
        }
    }

    /// Drop every cached response.
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }

    /// Clear the limiter windows; cumulative counters are kept.
    pub fn reset_rate_limiter(&self) {
        self.inner.limiter.reset();
    }

    /// Suggested wait when a quota window is nearly full.
    pub fn next_available_hint(&self) -> Option<Duration> {
        self.inner.limiter.next_available_hint()
    }

    /// Identifier of the underlying provider.
    pub fn provider_id(&self) -> &str {
        self.inner.provider.id()
    }

    async fn call_inner(
        &self,
        call_id: String,
        request: CompletionRequest,
    ) -> GatewayResult<CompletionResponse> {
        let inner = &self.inner;

        if let Err(error) = request.validate() {
            debug!(error = %error, "Request rejected by validation");
            return Err(error);
        }

        let request = request.with_defaults(&inner.defaults);
        let key = CacheKey::from_request(&request);

        if inner.cache_enabled {
            if let Some(cached) = inner.cache.get(key.as_str()) {
                debug!(key = %key, "Serving cached response");
                self.emit(GatewayEvent::CacheHit {
                    call_id: call_id.clone(),
                });
                return Ok(cached);
            }
            self.emit(GatewayEvent::CacheMiss {
                call_id: call_id.clone(),
            });
        }

        if let Err(error) = inner.limiter.check_and_record() {
            if let GatewayError::RateLimitExceeded {
                window,
                retry_after,
                ..
            } = &error
            {
                self.emit(GatewayEvent::AdmissionRejected {
                    call_id: call_id.clone(),
                    window: *window,
                    retry_after_ms: retry_after.as_millis() as u64,
                });
            }
            return Err(error);
        }

        let outbound = self.provider_request(request);
        let started = Instant::now();
        let attempts_made = AtomicU32::new(0);

        let attempts_fut = self.run_attempts(&call_id, &outbound, &attempts_made);
        let outcome = match inner.call_deadline {
            Some(deadline) => {
                match tokio::time::timeout(deadline, attempts_fut).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!(deadline_ms = deadline.as_millis() as u64, "Call deadline exceeded");
                        let error = GatewayError::timeout(
                            deadline,
                            format!("call did not complete within {}ms", deadline.as_millis()),
                        );
                        self.emit(GatewayEvent::CallFailed {
                            call_id: call_id.clone(),
                            kind: error.kind(),
                            attempts: attempts_made.load(Ordering::Relaxed),
                        });
                        return Err(error);
                    }
                }
            }
            None => attempts_fut.await,
        };

        let attempts = outcome.attempts();
        match outcome.into_result() {
            Ok(completion) => {
                let response = self.normalize(completion, &call_id);
                if inner.cache_enabled && response.has_content() {
                    inner.cache.set(key.as_str(), response.clone(), None);
                }
                self.emit(GatewayEvent::CallSucceeded {
                    call_id,
                    attempts,
                    latency_ms: started.elapsed().as_millis() as u64,
                });
                Ok(response)
            }
            Err(error) => {
                warn!(kind = %error.kind(), attempts = attempts, error = %error, "Call failed");
                self.emit(GatewayEvent::CallFailed {
                    call_id,
                    kind: error.kind(),
                    attempts,
                });
                Err(error)
            }
        }
    }

    /// Retry loop over single attempts; the limiter is not consulted again.
    async fn run_attempts(
        &self,
        call_id: &str,
        request: &ProviderRequest,
        attempts_made: &AtomicU32,
    ) -> RetryResult<ProviderCompletion> {
        self.inner
            .retry
            .run(
                |attempt| {
                    attempts_made.store(attempt, Ordering::Relaxed);
                    self.attempt(request, attempt)
                },
                |state, delay| {
                    self.emit(GatewayEvent::RetryScheduled {
                        call_id: call_id.to_string(),
                        attempt: state.attempt_number,
                        kind: state.last_error.kind(),
                        delay_ms: delay.as_millis() as u64,
                    });
                },
            )
            .await
    }

    /// One remote call bounded by the per-request timeout.
    async fn attempt(
        &self,
        request: &ProviderRequest,
        attempt: u32,
    ) -> GatewayResult<ProviderCompletion> {
        let provider = &self.inner.provider;
        let timeout = self.inner.request_timeout;
        debug!(attempt = attempt, "Calling provider");

        let result = match tokio::time::timeout(timeout, provider.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(timeout)),
        };
        result.map_err(|error| classify(error, provider.id()))
    }

    fn provider_request(&self, request: CompletionRequest) -> ProviderRequest {
        let defaults = &self.inner.defaults;
        ProviderRequest {
            model: self.inner.model.clone(),
            messages: request.messages,
            system: request.system,
            temperature: request.temperature.unwrap_or(defaults.temperature),
            max_tokens: request.max_tokens.unwrap_or(defaults.max_tokens),
            top_p: request.top_p.unwrap_or(defaults.top_p),
            stream: false,
        }
    }

    fn normalize(&self, completion: ProviderCompletion, call_id: &str) -> CompletionResponse {
        let created = (completion.created > 0)
            .then(|| DateTime::<Utc>::from_timestamp(completion.created, 0))
            .flatten()
            .unwrap_or_else(Utc::now);

        CompletionResponse {
            id: if completion.id.is_empty() {
                call_id.to_string()
            } else {
                completion.id
            },
            content: completion.content,
            model: if completion.model.is_empty() {
                self.inner.model.clone()
            } else {
                completion.model
            },
            usage: completion.usage,
            created,
            provider: self.inner.provider.id().to_string(),
        }
    }

    fn emit(&self, event: GatewayEvent) {
        if let Some(events) = &self.inner.events {
            // A dropped receiver only means nobody is listening.
            let _ = events.send(event);
        }
    }
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("provider", &self.inner.provider.id())
            .field("model", &self.inner.model)
            .field("limits", &self.inner.limiter.limits())
            .field("cache_enabled", &self.inner.cache_enabled)
            .finish_non_exhaustive()
    }
}

/// Builder for creating a [`GatewayClient`].
pub struct GatewayClientBuilder {
    provider: Arc<dyn CompletionProvider>,
    model: Option<String>,
    rate_limits: RateLimits,
    cache: CacheConfig,
    cache_enabled: bool,
    retry: RetryConfig,
    defaults: RequestDefaults,
    request_timeout: Duration,
    call_deadline: Option<Duration>,
    batch_concurrency: usize,
    events: Option<EventSink>,
}

impl GatewayClientBuilder {
    /// Create a builder with default limits, cache and retry settings.
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            provider,
            model: None,
            rate_limits: RateLimits::default(),
            cache: CacheConfig::default(),
            cache_enabled: true,
            retry: RetryConfig::default(),
            defaults: RequestDefaults::default(),
            request_timeout: ClientConfig::DEFAULT_TIMEOUT,
            call_deadline: None,
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
            events: None,
        }
    }

    /// Start from loaded configuration with an HTTP provider.
    pub fn from_config(config: &GatewayConfig) -> GatewayResult<Self> {
        let provider = HttpCompletionProvider::new(ClientConfig::from_settings(&config.provider)?)?;

        Ok(Self::new(Arc::new(provider))
            .model(config.provider.model.clone())
            .rate_limits(config.rate_limits)
            .cache(config.cache.into())
            .cache_enabled(config.cache.enabled)
            .retry(config.retry.into())
            .call_deadline(config.retry.call_deadline)
            .request_timeout(config.provider.request_timeout)
            .defaults(config.defaults)
            .batch_concurrency(config.batch.concurrency))
    }

    /// Set the model sent with every request.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the local quotas.
    #[must_use]
    pub const fn rate_limits(mut self, limits: RateLimits) -> Self {
        self.rate_limits = limits;
        self
    }

    /// Set the cache TTL and sweep interval.
    #[must_use]
    pub const fn cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Enable or disable the response cache.
    #[must_use]
    pub const fn cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Set the retry ceiling and backoff table.
    #[must_use]
    pub const fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the sampling defaults.
    #[must_use]
    pub const fn defaults(mut self, defaults: RequestDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Set the deadline of a single attempt.
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Bound a whole call, retries and backoff included.
    #[must_use]
    pub const fn call_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.call_deadline = deadline;
        self
    }

    /// Set how many batch items run at once.
    #[must_use]
    pub const fn batch_concurrency(mut self, concurrency: usize) -> Self {
        self.batch_concurrency = concurrency;
        self
    }

    /// Publish structured events to this sink.
    #[must_use]
    pub fn events(mut self, sink: EventSink) -> Self {
        self.events = Some(sink);
        self
    }

    /// Build the client.
    ///
    /// The cache sweeper is only started when a Tokio runtime is running.
    pub fn build(self) -> GatewayResult<GatewayClient> {
        if self.request_timeout.is_zero() {
            return Err(GatewayError::configuration(
                "request timeout must be greater than zero",
            ));
        }
        if self.batch_concurrency == 0 {
            return Err(GatewayError::configuration(
                "batch concurrency must be at least 1",
            ));
        }
        if self.cache_enabled && self.cache.sweep_interval.is_zero() {
            return Err(GatewayError::configuration(
                "cache sweep interval must be greater than zero",
            ));
        }

        let model = match self.model {
            Some(model) if !model.trim().is_empty() => model,
            _ => return Err(GatewayError::configuration("model is not set")),
        };

        let cache = Arc::new(ResponseCache::new(self.cache));
        let sweeper = if self.cache_enabled {
            cache.spawn_sweeper()
        } else {
            None
        };

        debug!(
            provider = %self.provider.id(),
            model = %model,
            per_minute = self.rate_limits.per_minute,
            per_hour = self.rate_limits.per_hour,
            per_day = self.rate_limits.per_day,
            cache_enabled = self.cache_enabled,
            max_attempts = self.retry.max_attempts,
            "Gateway client created"
        );

        Ok(GatewayClient {
            inner: Arc::new(ClientInner {
                provider: self.provider,
                model,
                limiter: RateLimiter::new(self.rate_limits),
                cache,
                cache_enabled: self.cache_enabled,
                retry: RetryPolicy::new(self.retry),
                defaults: self.defaults,
                request_timeout: self.request_timeout,
                call_deadline: self.call_deadline,
                batch_concurrency: self.batch_concurrency,
                events: self.events,
                sweeper,
            }),
        })
    }
}
