//! TTL response cache.
//!
//! Maps a canonical request fingerprint to a previously computed result.
//! Expiry is enforced lazily on every read; a background sweep only reclaims
//! memory and never changes what a read observes.

use gateway_core::{ChatMessage, CompletionRequest};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

/// Prefix of every completion cache key
pub const CACHE_KEY_PREFIX: &str = "completion";

/// Fields of a request that affect the completion, in a fixed order
#[derive(Serialize)]
struct KeyMaterial<'a> {
    messages: &'a [ChatMessage],
    system: Option<&'a str>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    top_p: Option<f32>,
}

/// Deterministic cache key derived from a request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key from the output-affecting fields of a request
    ///
    /// The request id and stream flag are not part of the key. Callers that
    /// apply defaults should do so before deriving the key.
    #[must_use]
    pub fn from_request(request: &CompletionRequest) -> Self {
        let material = KeyMaterial {
            messages: &request.messages,
            system: request.system.as_deref(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            top_p: request.top_p,
        };

        // Serializing plain strings, numbers and enums into a Vec cannot fail.
        let canonical = serde_json::to_vec(&material).unwrap_or_default();
        let digest = Sha256::digest(&canonical);

        Self(format!("{CACHE_KEY_PREFIX}:{}", hex::encode(digest)))
    }

    /// Key as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Cache configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// TTL applied when `set` gets no override
    pub default_ttl: Duration,
    /// Interval of the background expiry sweep
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(120),
        }
    }
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Entries physically stored, expired ones included until reclaimed
    pub total_keys: usize,
    /// Reads that found a live entry
    pub hits: u64,
    /// Reads that found nothing or an expired entry
    pub misses: u64,
    /// Hits over all reads, 0 when nothing was read
    pub hit_rate: f64,
    /// Writes
    pub sets: u64,
    /// Entries removed by `delete`
    pub deletes: u64,
    /// Expired entries reclaimed
    pub expirations: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    sets: u64,
    deletes: u64,
    expirations: u64,
}

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn expires_at(&self) -> Instant {
        self.inserted_at + self.ttl
    }

    /// Readable iff `now < inserted_at + ttl`
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at()
    }
}

#[derive(Debug)]
struct CacheInner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    counters: Counters,
}

/// In-memory TTL cache with hit/miss accounting
#[derive(Debug)]
pub struct ResponseCache<V> {
    config: CacheConfig,
    inner: Mutex<CacheInner<V>>,
}

impl<V: Clone> ResponseCache<V> {
    /// Create a cache
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                counters: Counters::default(),
            }),
        }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    /// Cache configuration
    #[must_use]
    pub fn config(&self) -> CacheConfig {
        self.config
    }

    /// Look up a live entry
    ///
    /// An expired entry is reclaimed on the spot and reported as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let live = match inner.entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            Some(_) => {
                inner.entries.remove(key);
                inner.counters.expirations += 1;
                debug!(key = %key, "Cache entry expired on read");
                None
            }
            None => None,
        };

        if live.is_some() {
            inner.counters.hits += 1;
        } else {
            inner.counters.misses += 1;
        }
        live
    }

    /// Whether a live entry exists, without touching the counters
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.inner
            .lock()
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_live(now))
    }

    /// Time left before a live entry expires
    pub fn remaining_ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.inner
            .lock()
            .entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.expires_at().saturating_duration_since(now))
    }

    /// Insert or overwrite an entry
    ///
    /// Overwriting restarts the entry's TTL. `ttl` overrides the default TTL.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let entry = CacheEntry {
            value,
            inserted_at: Instant::now(),
            ttl: ttl.unwrap_or(self.config.default_ttl),
        };

        let mut inner = self.inner.lock();
        inner.entries.insert(key.into(), entry);
        inner.counters.sets += 1;
    }

    /// Remove an entry, returning how many were removed
    pub fn delete(&self, key: &str) -> usize {
        let mut inner = self.inner.lock();
        if inner.entries.remove(key).is_some() {
            inner.counters.deletes += 1;
            1
        } else {
            0
        }
    }

    /// Drop every entry
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let dropped = inner.entries.len();
        inner.entries.clear();
        debug!(entries = dropped, "Cache cleared");
    }

    /// Reclaim expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let before = inner.entries.len();
        inner.entries.retain(|_, entry| entry.is_live(now));
        let removed = before - inner.entries.len();
        inner.counters.expirations += removed as u64;

        if removed > 0 {
            debug!(removed = removed, "Expired cache entries purged");
        }
        removed
    }

    /// Counters and hit rate
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let counters = inner.counters;
        let reads = counters.hits + counters.misses;

        CacheStats {
            total_keys: inner.entries.len(),
            hits: counters.hits,
            misses: counters.misses,
            hit_rate: if reads == 0 {
                0.0
            } else {
                counters.hits as f64 / reads as f64
            },
            sets: counters.sets,
            deletes: counters.deletes,
            expirations: counters.expirations,
        }
    }
}

impl<V: Clone + Send + 'static> ResponseCache<V> {
    /// Spawn the background expiry sweep on the current Tokio runtime
    ///
    /// The task holds a weak reference and ends once the cache is dropped.
    /// Returns `None` when called outside a runtime or with a zero interval.
    pub fn spawn_sweeper(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let period = self.config.sweep_interval;
        if period.is_zero() {
            return None;
        }
        let handle = tokio::runtime::Handle::try_current().ok()?;
        let cache: Weak<Self> = Arc::downgrade(self);

        Some(handle.spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                cache.purge_expired();
            }
        }))
    }
}
