//! Multi-tier sliding window rate limiter.
//!
//! Tracks admitted calls in three rolling windows (minute, hour, day). A call
//! is admitted only if every window has room, and an admitted call occupies a
//! slot in all three windows at once.

use chrono::{DateTime, Utc};
use gateway_core::{GatewayError, GatewayResult, QuotaWindow};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Fraction of a window's capacity at which [`RateLimiter::next_available_hint`] fires
const NEAR_CAPACITY_RATIO: f64 = 0.9;

/// Per-window request quotas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimits {
    /// Calls allowed in any trailing 60 seconds
    pub per_minute: u32,
    /// Calls allowed in any trailing hour
    pub per_hour: u32,
    /// Calls allowed in any trailing day
    pub per_day: u32,
}

impl RateLimits {
    /// Create a set of quotas
    #[must_use]
    pub const fn new(per_minute: u32, per_hour: u32, per_day: u32) -> Self {
        Self {
            per_minute,
            per_hour,
            per_day,
        }
    }

    /// Quota of a single window
    #[must_use]
    pub const fn limit(&self, window: QuotaWindow) -> u32 {
        match window {
            QuotaWindow::Minute => self.per_minute,
            QuotaWindow::Hour => self.per_hour,
            QuotaWindow::Day => self.per_day,
        }
    }
}

impl Default for RateLimits {
    fn default() -> Self {
        Self::new(60, 1_000, 10_000)
    }
}

/// Value reported for each of the three windows
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerWindow<T> {
    /// Minute window
    pub minute: T,
    /// Hour window
    pub hour: T,
    /// Day window
    pub day: T,
}

/// Snapshot of limiter state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimiterStats {
    /// Configured quotas
    pub limits: RateLimits,
    /// Calls currently counted in each window
    pub current_usage: PerWindow<u32>,
    /// Usage as a percentage of each quota
    pub usage_percentages: PerWindow<f64>,
    /// Calls admitted since construction
    pub total_requests: u64,
    /// Calls rejected since construction
    pub rejected_requests: u64,
    /// Last time the windows were cleared
    pub last_reset: DateTime<Utc>,
}

/// One rolling window of admitted-call timestamps
#[derive(Debug)]
struct RateWindow {
    window: QuotaWindow,
    limit: u32,
    timestamps: VecDeque<Instant>,
}

impl RateWindow {
    fn new(window: QuotaWindow, limit: u32) -> Self {
        Self {
            window,
            limit,
            timestamps: VecDeque::new(),
        }
    }

    /// Drop timestamps that have slid out of the window
    fn prune(&mut self, now: Instant) {
        let width = self.window.width();
        while let Some(oldest) = self.timestamps.front() {
            if now.saturating_duration_since(*oldest) >= width {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn usage(&self) -> u32 {
        self.timestamps.len() as u32
    }

    fn is_full(&self) -> bool {
        self.usage() >= self.limit
    }

    /// Time until the oldest counted call leaves the window
    fn wait_time(&self, now: Instant) -> Duration {
        let width = self.window.width();
        self.timestamps.front().map_or(width, |oldest| {
            width.saturating_sub(now.saturating_duration_since(*oldest))
        })
    }

    fn usage_percentage(&self) -> f64 {
        if self.limit == 0 {
            return 100.0;
        }
        f64::from(self.usage()) * 100.0 / f64::from(self.limit)
    }

    fn is_near_capacity(&self) -> bool {
        f64::from(self.usage()) >= f64::from(self.limit) * NEAR_CAPACITY_RATIO
    }
}

#[derive(Debug)]
struct LimiterState {
    minute: RateWindow,
    hour: RateWindow,
    day: RateWindow,
    total_requests: u64,
    rejected_requests: u64,
    last_reset: DateTime<Utc>,
}

impl LimiterState {
    fn window(&self, window: QuotaWindow) -> &RateWindow {
        match window {
            QuotaWindow::Minute => &self.minute,
            QuotaWindow::Hour => &self.hour,
            QuotaWindow::Day => &self.day,
        }
    }

    fn prune(&mut self, now: Instant) {
        self.minute.prune(now);
        self.hour.prune(now);
        self.day.prune(now);
    }
}

/// Sliding window rate limiter over minute, hour and day quotas
///
/// All state sits behind one mutex so prune, check and record happen as a
/// single critical section per call.
#[derive(Debug)]
pub struct RateLimiter {
    limits: RateLimits,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    /// Create a limiter with the given quotas
    #[must_use]
    pub fn new(limits: RateLimits) -> Self {
        Self {
            limits,
            state: Mutex::new(LimiterState {
                minute: RateWindow::new(QuotaWindow::Minute, limits.per_minute),
                hour: RateWindow::new(QuotaWindow::Hour, limits.per_hour),
                day: RateWindow::new(QuotaWindow::Day, limits.per_day),
                total_requests: 0,
                rejected_requests: 0,
                last_reset: Utc::now(),
            }),
        }
    }

    /// Create with default quotas
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(RateLimits::default())
    }

    /// Configured quotas
    #[must_use]
    pub fn limits(&self) -> RateLimits {
        self.limits
    }

    /// Admit and record a call, or reject it
    ///
    /// # Errors
    /// Returns [`GatewayError::RateLimitExceeded`] naming the most restrictive
    /// breached window and the time until it frees a slot
    pub fn check_and_record(&self) -> GatewayResult<()> {
        self.check_and_record_at(Instant::now())
    }

    pub(crate) fn check_and_record_at(&self, now: Instant) -> GatewayResult<()> {
        let mut state = self.state.lock();
        state.prune(now);

        // Most restrictive first: the day quota decides before hour and minute.
        for window in [QuotaWindow::Day, QuotaWindow::Hour, QuotaWindow::Minute] {
            let rate_window = state.window(window);
            if rate_window.is_full() {
                let retry_after = rate_window.wait_time(now);
                let limit = rate_window.limit;
                state.rejected_requests += 1;

                warn!(
                    window = %window,
                    limit = limit,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "Rate limit exceeded"
                );
                return Err(GatewayError::rate_limit_exceeded(window, limit, retry_after));
            }
        }

        state.minute.timestamps.push_back(now);
        state.hour.timestamps.push_back(now);
        state.day.timestamps.push_back(now);
        state.total_requests += 1;

        debug!(
            minute = state.minute.usage(),
            hour = state.hour.usage(),
            day = state.day.usage(),
            "Call admitted"
        );
        Ok(())
    }

    /// Current usage and totals
    #[must_use]
    pub fn stats(&self) -> RateLimiterStats {
        self.stats_at(Instant::now())
    }

    pub(crate) fn stats_at(&self, now: Instant) -> RateLimiterStats {
        let mut state = self.state.lock();
        state.prune(now);

        RateLimiterStats {
            limits: self.limits,
            current_usage: PerWindow {
                minute: state.minute.usage(),
                hour: state.hour.usage(),
                day: state.day.usage(),
            },
            usage_percentages: PerWindow {
                minute: state.minute.usage_percentage(),
                hour: state.hour.usage_percentage(),
                day: state.day.usage_percentage(),
            },
            total_requests: state.total_requests,
            rejected_requests: state.rejected_requests,
            last_reset: state.last_reset,
        }
    }

    /// Wait estimate when any window is at 90% of its quota or more
    ///
    /// Windows are checked minute, hour, day; the first one near capacity
    /// determines the hint.
    #[must_use]
    pub fn next_available_hint(&self) -> Option<Duration> {
        self.next_available_hint_at(Instant::now())
    }

    pub(crate) fn next_available_hint_at(&self, now: Instant) -> Option<Duration> {
        let mut state = self.state.lock();
        state.prune(now);

        QuotaWindow::ALL
            .into_iter()
            .map(|window| state.window(window))
            .find(|rate_window| rate_window.is_near_capacity())
            .map(|rate_window| rate_window.wait_time(now))
    }

    /// Clear all three windows
    ///
    /// Cumulative admitted/rejected counters are kept.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.minute.timestamps.clear();
        state.hour.timestamps.clear();
        state.day.timestamps.clear();
        state.last_reset = Utc::now();

        info!("Rate limiter windows reset");
    }
}
