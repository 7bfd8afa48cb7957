//! Quarry Web Server
//!
//! HTTP API over the research orchestrator.

pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;

// Re-export main types
pub use server::QuarryServer;
pub use state::AppState;

use axum::{
    extract::rejection::JsonRejection,
    http::{header::CONTENT_TYPE, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    Router,
};
use quarry_research::ResearchError;
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .nest("/api", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Configuration for the web server
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl WebConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("QUARRY_HOST").unwrap_or(defaults.host),
            port: std::env::var("QUARRY_PORT")
                .ok()
                .and_then(|port| port.parse().ok())
                .unwrap_or(defaults.port),
        }
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Error types for the web server
#[derive(thiserror::Error, Debug)]
pub enum WebError {
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    #[error(transparent)]
    Research(#[from] ResearchError),

    #[error("Invalid request body: {0}")]
    InvalidBody(#[from] JsonRejection),
}

/// Result type for web operations
pub type WebResult<T> = Result<T, WebError>;

/// Client closed the request before the research finished
const CLIENT_CLOSED_REQUEST: u16 = 499;

impl WebError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebError::Research(error) => match error {
                ResearchError::Validation { .. } => StatusCode::BAD_REQUEST,
                ResearchError::Cancelled { .. } => StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                ResearchError::RetryBudgetExhausted { .. }
                | ResearchError::Capability { .. }
                | ResearchError::InsufficientEvidence { .. } => StatusCode::BAD_GATEWAY,
                ResearchError::Config { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            WebError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            WebError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short description shown to API clients
    fn summary(&self) -> &'static str {
        match self.status_code() {
            StatusCode::BAD_REQUEST => "Invalid input",
            StatusCode::BAD_GATEWAY => "Failed to conduct research",
            status if status.as_u16() == CLIENT_CLOSED_REQUEST => "Research cancelled",
            _ => "Internal server error",
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Internal failures are logged, not echoed
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "success": false,
            "error": self.summary(),
            "message": message,
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_research::Stage;

    #[test]
    fn test_research_errors_map_to_status_codes() {
        let cases = [
            (ResearchError::validation("empty topic"), 400),
            (ResearchError::Cancelled { stage: Stage::Search }, 499),
            (ResearchError::capability("document provider", "down"), 502),
            (
                ResearchError::RetryBudgetExhausted {
                    attempts: 3,
                    last_error: Box::new(ResearchError::InsufficientEvidence {
                        found: 1,
                        required: 3,
                    }),
                },
                502,
            ),
            (ResearchError::config("missing key"), 500),
        ];

        for (error, expected) in cases {
            assert_eq!(WebError::from(error).status_code().as_u16(), expected);
        }
    }

    #[test]
    fn test_bind_failure_is_internal_error() {
        let error = WebError::from(std::io::Error::new(
            std::io::ErrorKind::AddrInUse,
            "address in use",
        ));
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.summary(), "Internal server error");
    }

    #[test]
    fn test_config_defaults() {
        let config = WebConfig::default();
        assert_eq!(config.address(), "127.0.0.1:3000");
    }
}
