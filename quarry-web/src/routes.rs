//! Route definitions for the Quarry web server

use crate::{handlers, AppState};
use axum::{
    routing::{get, post},
    Router,
};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Research
        .route("/research", post(handlers::conduct_research))
        .route("/clarify", post(handlers::clarify_topic))
        .route("/refine", post(handlers::refine_query))
}
