//! # Gateway Client
//!
//! A quota-aware completion client. Every call is:
//!
//! - validated before any I/O,
//! - served from an in-memory TTL cache when an identical request succeeded recently,
//! - admitted against per-minute, per-hour and per-day quotas,
//! - retried with linear backoff when the failure is transient.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gateway_client::GatewayClient;
//! use gateway_core::CompletionRequest;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = gateway_config::load_config("gateway.yaml").await?;
//!     let client = GatewayClient::from_config(&config)?;
//!
//!     let results = client
//!         .call_batch(vec![
//!             CompletionRequest::user("Name a colour"),
//!             CompletionRequest::user("Name a fruit"),
//!         ])
//!         .await;
//!
//!     for result in results {
//!         match result {
//!             Ok(response) => println!("{}", response.content),
//!             Err(e) => eprintln!("Error: {e}"),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod classify;
mod client;
mod config;
mod http;

pub use classify::classify;
pub use client::{GatewayClient, GatewayClientBuilder, GatewayStats, DEFAULT_BATCH_CONCURRENCY};
pub use config::ClientConfig;
pub use http::HttpCompletionProvider;

// Re-export core types for convenience
pub use gateway_core::{
    ChatMessage, CompletionRequest, CompletionResponse, ErrorKind, GatewayError, GatewayEvent,
    GatewayResult, Usage,
};
