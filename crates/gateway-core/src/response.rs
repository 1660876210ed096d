//! Normalized response envelope returned to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalized completion result, independent of the provider's wire shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Provider's response identifier
    pub id: String,
    /// Generated text of the first choice
    pub content: String,
    /// Model that produced the completion
    pub model: String,
    /// Token usage reported by the provider
    pub usage: Usage,
    /// Creation time reported by the provider
    pub created: DateTime<Utc>,
    /// Identifier of the provider that served the call
    pub provider: String,
}

impl CompletionResponse {
    /// Whether the completion carries any text
    #[must_use]
    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt
    #[serde(default)]
    pub prompt_tokens: u32,
    /// Tokens in the completion
    #[serde(default)]
    pub completion_tokens: u32,
    /// Total tokens used
    #[serde(default)]
    pub total_tokens: u32,
}

impl Usage {
    /// Create usage counts, deriving the total
    #[must_use]
    pub const fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}
