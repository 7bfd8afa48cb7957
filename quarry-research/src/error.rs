//! Research pipeline error type

use crate::state::Stage;
use quarry_core::QuarryError;
use quarry_llm::LlmError;

/// Errors a research run can terminate with
#[derive(Debug, thiserror::Error)]
pub enum ResearchError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Insufficient evidence: found {found} relevant documents, need at least {required}")]
    InsufficientEvidence { found: usize, required: usize },

    #[error("{capability} failed: {message}")]
    Capability {
        capability: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Research cancelled during {stage} stage")]
    Cancelled { stage: Stage },

    #[error("Research failed after {attempts} attempts: {last_error}")]
    RetryBudgetExhausted {
        attempts: usize,
        last_error: Box<ResearchError>,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

pub type ResearchResult<T> = Result<T, ResearchError>;

impl ResearchError {
    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a capability error without an underlying source
    pub fn capability<C: Into<String>, S: Into<String>>(capability: C, message: S) -> Self {
        Self::Capability {
            capability: capability.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a capability error with source
    pub fn capability_with_source<C, S, E>(capability: C, message: S, source: E) -> Self
    where
        C: Into<String>,
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Capability {
            capability: capability.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Map a model error raised inside `capability`.
    ///
    /// Malformed model output is a validation failure; anything on the way to
    /// the model is a capability failure.
    pub fn from_llm(capability: &str, error: LlmError) -> Self {
        match error {
            LlmError::InvalidOutput(message) => Self::Validation {
                message: format!("{}: {}", capability, message),
            },
            LlmError::Config(message) => Self::Config { message },
            other => Self::Capability {
                capability: capability.to_string(),
                message: other.to_string(),
                source: Some(Box::new(other)),
            },
        }
    }

    /// Whether the orchestrator may restore its checkpoint and try again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ResearchError::InsufficientEvidence { .. } | ResearchError::Capability { .. }
        )
    }
}

impl From<LlmError> for ResearchError {
    fn from(error: LlmError) -> Self {
        Self::from_llm("llm", error)
    }
}

impl From<QuarryError> for ResearchError {
    fn from(error: QuarryError) -> Self {
        match error {
            QuarryError::Config { message, .. } => Self::Config { message },
            other => Self::Config {
                message: other.to_string(),
            },
        }
    }
}
