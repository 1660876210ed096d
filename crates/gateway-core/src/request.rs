//! Request types for the gateway.
//!
//! [`CompletionRequest`] is what callers hand to the gateway. It carries the
//! conversation and optional sampling parameters; anything left unset is
//! filled from the client's [`RequestDefaults`] before the request is keyed
//! for the cache or sent to the provider.

use crate::error::{GatewayError, GatewayResult};
use serde::{Deserialize, Serialize};

/// Inclusive range accepted for `temperature`
pub const TEMPERATURE_RANGE: (f32, f32) = (0.0, 2.0);

/// Inclusive range accepted for `top_p`
pub const TOP_P_RANGE: (f32, f32) = (0.0, 1.0);

/// Completion request as submitted by callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Caller-supplied request identifier (never part of the cache key)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Conversation messages
    pub messages: Vec<ChatMessage>,

    /// System prompt sent alongside the messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Sampling temperature (0.0 - 2.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Nucleus sampling parameter (0.0 - 1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Transport hint; accepted but responses are always delivered whole
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

impl CompletionRequest {
    /// Create a request from a list of messages
    #[must_use]
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            id: None,
            messages,
            system: None,
            temperature: None,
            max_tokens: None,
            top_p: None,
            stream: None,
        }
    }

    /// Create a single-turn request with one user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(vec![ChatMessage::user(content)])
    }

    /// Create a new builder for `CompletionRequest`
    #[must_use]
    pub fn builder() -> CompletionRequestBuilder {
        CompletionRequestBuilder::default()
    }

    /// Validate the shape of the request
    ///
    /// # Errors
    /// Returns a validation error naming the first offending field
    pub fn validate(&self) -> GatewayResult<()> {
        if self.messages.is_empty() {
            return Err(GatewayError::validation(
                "messages cannot be empty",
                Some("messages"),
            ));
        }

        for (index, message) in self.messages.iter().enumerate() {
            if message.content.trim().is_empty() {
                return Err(GatewayError::validation(
                    format!("message {index} has empty content"),
                    Some("messages"),
                ));
            }
        }

        if let Some(system) = &self.system {
            if system.trim().is_empty() {
                return Err(GatewayError::validation(
                    "system prompt cannot be blank",
                    Some("system"),
                ));
            }
        }

        if let Some(temperature) = self.temperature {
            let (min, max) = TEMPERATURE_RANGE;
            if !(min..=max).contains(&temperature) {
                return Err(GatewayError::validation(
                    format!("temperature must be between {min} and {max}, got {temperature}"),
                    Some("temperature"),
                ));
            }
        }

        if let Some(top_p) = self.top_p {
            let (min, max) = TOP_P_RANGE;
            if !(min..=max).contains(&top_p) {
                return Err(GatewayError::validation(
                    format!("top_p must be between {min} and {max}, got {top_p}"),
                    Some("top_p"),
                ));
            }
        }

        if self.max_tokens == Some(0) {
            return Err(GatewayError::validation(
                "max_tokens must be at least 1",
                Some("max_tokens"),
            ));
        }

        Ok(())
    }

    /// Fill unset sampling parameters from `defaults`
    #[must_use]
    pub fn with_defaults(mut self, defaults: &RequestDefaults) -> Self {
        self.temperature = self.temperature.or(Some(defaults.temperature));
        self.max_tokens = self.max_tokens.or(Some(defaults.max_tokens));
        self.top_p = self.top_p.or(Some(defaults.top_p));
        self
    }
}

/// Builder for `CompletionRequest`
#[derive(Debug, Default)]
pub struct CompletionRequestBuilder {
    id: Option<String>,
    messages: Vec<ChatMessage>,
    system: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    top_p: Option<f32>,
    stream: Option<bool>,
}

impl CompletionRequestBuilder {
    /// Set the request id
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Add a message
    #[must_use]
    pub fn message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Add a user message
    #[must_use]
    pub fn user_message(self, content: impl Into<String>) -> Self {
        self.message(ChatMessage::user(content))
    }

    /// Add an assistant message
    #[must_use]
    pub fn assistant_message(self, content: impl Into<String>) -> Self {
        self.message(ChatMessage::assistant(content))
    }

    /// Set the system prompt
    #[must_use]
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the temperature
    #[must_use]
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set max_tokens
    #[must_use]
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set top_p
    #[must_use]
    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Set the stream flag
    #[must_use]
    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = Some(stream);
        self
    }

    /// Build and validate the request
    ///
    /// # Errors
    /// Returns a validation error if the request is malformed
    pub fn build(self) -> GatewayResult<CompletionRequest> {
        let request = CompletionRequest {
            id: self.id,
            messages: self.messages,
            system: self.system,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
            stream: self.stream,
        };

        request.validate()?;

        Ok(request)
    }
}

/// Sampling parameters applied when a request leaves them unset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestDefaults {
    /// Default temperature
    pub temperature: f32,
    /// Default max_tokens
    pub max_tokens: u32,
    /// Default top_p
    pub top_p: f32,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1024,
            top_p: 1.0,
        }
    }
}

/// Chat message with role and content
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message author
    pub role: MessageRole,
    /// Text content of the message
    pub content: String,
}

impl ChatMessage {
    /// Create a message
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System message
    System,
    /// User message
    User,
    /// Assistant message
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}
