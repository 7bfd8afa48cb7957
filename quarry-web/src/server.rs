//! Quarry Web Server
//!
//! Main web server implementation using Axum.

use crate::{create_app, AppState, WebConfig, WebError, WebResult};
use axum::serve;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Main Quarry web server
pub struct QuarryServer {
    config: WebConfig,
    state: AppState,
}

impl QuarryServer {
    pub fn new(config: WebConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Start the web server and run until Ctrl-C
    pub async fn start(self) -> WebResult<()> {
        let address = self.config.address();
        info!("Starting Quarry Web Server");

        let app = create_app(self.state.clone());

        let listener = TcpListener::bind(&address)
            .await
            .map_err(WebError::Server)?;

        info!("Server listening on http://{}", address);

        if let Err(e) = serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
        {
            error!("Server error: {}", e);
            return Err(WebError::Server(e));
        }

        info!("Server shut down gracefully");
        Ok(())
    }

    /// Get server configuration
    pub fn config(&self) -> &WebConfig {
        &self.config
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
