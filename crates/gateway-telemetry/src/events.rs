//! Forwards client events to the log.

use gateway_core::{EventStream, GatewayEvent};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Log a single event at a level matching its severity
pub fn log_event(event: &GatewayEvent) {
    match event {
        GatewayEvent::CacheHit { call_id } => debug!(call_id = %call_id, "Cache hit"),
        GatewayEvent::CacheMiss { call_id } => debug!(call_id = %call_id, "Cache miss"),
        GatewayEvent::AdmissionRejected {
            call_id,
            window,
            retry_after_ms,
        } => warn!(
            call_id = %call_id,
            window = %window,
            retry_after_ms = retry_after_ms,
            "Call rejected by rate limiter"
        ),
        GatewayEvent::RetryScheduled {
            call_id,
            attempt,
            kind,
            delay_ms,
        } => info!(
            call_id = %call_id,
            attempt = attempt,
            kind = %kind,
            delay_ms = delay_ms,
            "Retry scheduled"
        ),
        GatewayEvent::CallSucceeded {
            call_id,
            attempts,
            latency_ms,
        } => info!(
            call_id = %call_id,
            attempts = attempts,
            latency_ms = latency_ms,
            "Call succeeded"
        ),
        GatewayEvent::CallFailed {
            call_id,
            kind,
            attempts,
        } => warn!(call_id = %call_id, kind = %kind, attempts = attempts, "Call failed"),
    }
}

/// Drain the event stream into the log until every sender is dropped
///
/// Resolves to the number of events logged.
pub fn spawn_event_logger(mut events: EventStream) -> JoinHandle<u64> {
    tokio::spawn(async move {
        let mut logged = 0;
        while let Some(event) = events.recv().await {
            log_event(&event);
            logged += 1;
        }
        logged
    })
}
