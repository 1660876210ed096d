//! # Gateway Core
//!
//! Core types, traits, and error handling for the completion gateway.
//!
//! This crate provides the foundational types used throughout the gateway:
//! - Request and response types
//! - The provider trait and its raw transport failures
//! - The classified error taxonomy
//! - Structured client events

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod events;
pub mod provider;
pub mod request;
pub mod response;

// Re-export commonly used types
pub use error::{ErrorKind, GatewayError, GatewayResult, QuotaWindow, RETRYABLE_STATUSES};
pub use events::{event_channel, EventSink, EventStream, GatewayEvent};
pub use provider::{CompletionProvider, ProviderCompletion, ProviderRequest, TransportError};
pub use request::{
    ChatMessage, CompletionRequest, CompletionRequestBuilder, MessageRole, RequestDefaults,
};
pub use response::{CompletionResponse, Usage};
