//! Structured events emitted by the gateway client.
//!
//! The client pushes these onto an optional channel so monitoring code can
//! observe admission, caching and retry decisions without the client knowing
//! who listens.

use crate::error::{ErrorKind, QuotaWindow};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Sending half of the event channel
pub type EventSink = UnboundedSender<GatewayEvent>;

/// Receiving half of the event channel
pub type EventStream = UnboundedReceiver<GatewayEvent>;

/// Create a connected event sink and stream
#[must_use]
pub fn event_channel() -> (EventSink, EventStream) {
    mpsc::unbounded_channel()
}

/// Something observable happened while serving a call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// Served from the response cache
    CacheHit {
        /// Call identifier
        call_id: String,
    },
    /// Cache lookup missed
    CacheMiss {
        /// Call identifier
        call_id: String,
    },
    /// Local admission control rejected the call
    AdmissionRejected {
        /// Call identifier
        call_id: String,
        /// Window whose quota was breached
        window: QuotaWindow,
        /// Milliseconds until a slot frees up
        retry_after_ms: u64,
    },
    /// An attempt failed and another is scheduled
    RetryScheduled {
        /// Call identifier
        call_id: String,
        /// Attempt that just failed (1-based)
        attempt: u32,
        /// Kind of the failure
        kind: ErrorKind,
        /// Backoff before the next attempt
        delay_ms: u64,
    },
    /// The remote call succeeded
    CallSucceeded {
        /// Call identifier
        call_id: String,
        /// Attempts used
        attempts: u32,
        /// Wall time of the call in milliseconds
        latency_ms: u64,
    },
    /// The call failed for good
    CallFailed {
        /// Call identifier
        call_id: String,
        /// Kind of the final error
        kind: ErrorKind,
        /// Attempts used
        attempts: u32,
    },
}

impl GatewayEvent {
    /// Identifier of the call this event belongs to
    #[must_use]
    pub fn call_id(&self) -> &str {
        match self {
            Self::CacheHit { call_id }
            | Self::CacheMiss { call_id }
            | Self::AdmissionRejected { call_id, .. }
            | Self::RetryScheduled { call_id, .. }
            | Self::CallSucceeded { call_id, .. }
            | Self::CallFailed { call_id, .. } => call_id,
        }
    }
}
