//! Test fixtures and sample data for integration tests

use gateway_core::{ChatMessage, CompletionRequest};
use serde_json::{json, Value};

/// Model configured for every test client
pub const TEST_MODEL: &str = "test-model";

/// API key configured for every test client
pub const TEST_API_KEY: &str = "sk-test-key";

/// Single user message request
pub fn simple_request(prompt: &str) -> CompletionRequest {
    CompletionRequest::user(prompt)
}

/// Request with a system prompt and explicit sampling parameters
pub fn detailed_request(system: &str, user: &str) -> CompletionRequest {
    CompletionRequest::builder()
        .system(system)
        .user_message(user)
        .temperature(0.3)
        .max_tokens(128)
        .top_p(0.9)
        .build()
        .expect("valid request")
}

/// Multi-turn conversation
pub fn conversation_request() -> CompletionRequest {
    CompletionRequest::new(vec![
        ChatMessage::user("What is 2 + 2?"),
        ChatMessage::assistant("2 + 2 equals 4."),
        ChatMessage::user("And what is that multiplied by 3?"),
    ])
}

/// Successful `/chat/completions` body
pub fn chat_completion_body(content: &str) -> Value {
    json!({
        "id": "chatcmpl-test123",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": TEST_MODEL,
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": content
            },
            "finish_reason": "stop"
        }],
        "usage": {
            "prompt_tokens": 10,
            "completion_tokens": 20,
            "total_tokens": 30
        }
    })
}

/// Successful body without any choices
pub fn empty_completion_body() -> Value {
    json!({
        "id": "chatcmpl-empty",
        "created": 1_700_000_000,
        "model": TEST_MODEL,
        "choices": []
    })
}

/// Error body in the `{"error": {...}}` shape
pub fn error_body(error_type: &str, message: &str) -> Value {
    json!({
        "error": {
            "message": message,
            "type": error_type,
            "code": error_type
        }
    })
}
