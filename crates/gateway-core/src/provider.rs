//! Provider abstraction.
//!
//! A [`CompletionProvider`] performs exactly one remote call and reports what
//! happened on the wire. It never retries and never classifies: failures come
//! back as raw [`TransportError`]s and the gateway decides what they mean.

use crate::request::ChatMessage;
use crate::response::Usage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Body of an outbound completion call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// Target model
    pub model: String,
    /// Conversation messages
    pub messages: Vec<ChatMessage>,
    /// System prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Nucleus sampling parameter
    pub top_p: f32,
    /// Always `false`; responses are read whole
    pub stream: bool,
}

/// Successful provider reply, before normalization
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProviderCompletion {
    /// Response identifier
    pub id: String,
    /// Model reported by the provider
    pub model: String,
    /// Unix timestamp (seconds) of creation
    pub created: i64,
    /// Text of the first choice, empty when the provider returned none
    pub content: String,
    /// Token usage
    pub usage: Usage,
}

/// Raw transport-level failure of a single attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The attempt exceeded its deadline
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The request never reached the server or the connection dropped
    #[error("connection failed: {0}")]
    Connect(String),

    /// The server answered with a non-2xx status
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Provider error message or raw body
        message: String,
        /// Wait hint parsed from `retry-after` / rate-limit reset headers
        retry_after: Option<Duration>,
    },

    /// The server answered but the body could not be decoded
    #[error("undecodable response (HTTP {status}): {message}")]
    Decode {
        /// HTTP status code of the response
        status: u16,
        /// Decoder error
        message: String,
    },
}

/// A remote completion backend
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider identifier reported in responses and errors
    fn id(&self) -> &str;

    /// Perform one completion call
    async fn complete(&self, request: &ProviderRequest)
        -> Result<ProviderCompletion, TransportError>;
}
