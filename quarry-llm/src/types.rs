//! Shared types for text generation

use serde::{Deserialize, Serialize};

/// Errors raised by text generation and output parsing
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LLM request failed: {0}")]
    Request(String),

    #[error("Model {0} returned no text content")]
    EmptyResponse(String),

    #[error("Invalid model output: {0}")]
    InvalidOutput(String),
}

impl LlmError {
    /// Whether the error is about the content the model produced rather than
    /// the transport used to reach it
    pub fn is_output_error(&self) -> bool {
        matches!(self, LlmError::InvalidOutput(_) | LlmError::EmptyResponse(_))
    }
}

pub type LlmResult<T> = Result<T, LlmError>;

/// Token counts for one completion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCount {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenCount {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// A single system + user prompt addressed to a specific model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub model: String,
    pub system: String,
    pub user: String,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: String::new(),
            user: String::new(),
        }
    }

    pub fn system(mut self, prompt: impl Into<String>) -> Self {
        self.system = prompt.into();
        self
    }

    pub fn user(mut self, message: impl Into<String>) -> Self {
        self.user = message.into();
        self
    }
}

/// Text produced by a model together with its token usage
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub model: String,
    pub usage: TokenCount,
}
