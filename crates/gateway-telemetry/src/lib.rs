//! # Gateway Telemetry
//!
//! Structured logging for the completion gateway:
//! - `tracing-subscriber` setup with pretty or JSON output
//! - A task that forwards client events to the log

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod events;
pub mod logging;

// Re-export main types
pub use events::{log_event, spawn_event_logger};
pub use logging::{init_logging, LogFormat, LoggingConfig, TelemetryError};
