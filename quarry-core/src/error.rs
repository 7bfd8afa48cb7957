//! Configuration error types
//!
//! Errors carry the component and operation that failed plus recovery
//! suggestions that front ends print next to the message.

use thiserror::Error;

pub type QuarryResult<T> = Result<T, QuarryError>;

/// Where an error happened and what the user can do about it
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Component where error originated
    pub component: String,
    /// Operation being performed when error occurred
    pub operation: Option<String>,
    /// Recovery suggestions
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            component: component.to_string(),
            ..Self::default()
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// Errors raised while locating, loading, validating or saving configuration
#[derive(Error, Debug)]
pub enum QuarryError {
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Resource not found: {resource}")]
    NotFound {
        resource: String,
        context: ErrorContext,
    },
}

impl QuarryError {
    /// Get the error context
    pub fn context(&self) -> &ErrorContext {
        match self {
            QuarryError::Config { context, .. } => context,
            QuarryError::NotFound { context, .. } => context,
        }
    }

    /// Recovery suggestions attached to the error, possibly empty
    pub fn suggestions(&self) -> &[String] {
        &self.context().recovery_suggestions
    }
}

/// Convenience macros for creating errors with context
#[macro_export]
macro_rules! config_error {
    ($msg:expr, $component:expr) => {
        $crate::QuarryError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check your configuration file")
                .with_suggestion("Run 'quarry config --init' to create default config"),
        }
    };
}

#[macro_export]
macro_rules! not_found_error {
    ($resource:expr, $component:expr) => {
        $crate::QuarryError::NotFound {
            resource: $resource.to_string(),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Verify the resource path or URL")
                .with_suggestion("Check if the resource exists and is accessible"),
        }
    };
}
