//! Application state shared by all handlers

use crate::{WebConfig, WebResult};
use quarry_core::QuarryConfig;
use quarry_research::{create_orchestrator, ResearchOrchestrator};
use std::sync::Arc;
use tracing::info;

/// Application state; cheap to clone
#[derive(Clone)]
pub struct AppState {
    /// Configuration
    pub config: WebConfig,
    /// Orchestrator serving every request. Each request is an independent run.
    pub orchestrator: Arc<ResearchOrchestrator>,
}

impl AppState {
    pub fn new(config: WebConfig, orchestrator: ResearchOrchestrator) -> Self {
        Self {
            config,
            orchestrator: Arc::new(orchestrator),
        }
    }

    /// Build state backed by the configured LLM provider and search endpoint
    pub fn from_config(config: WebConfig, quarry: &QuarryConfig) -> WebResult<Self> {
        let orchestrator = create_orchestrator(quarry)?;
        info!(
            provider = %quarry.llm.provider,
            search_endpoint = %quarry.search.endpoint,
            "Research orchestrator ready"
        );
        Ok(Self::new(config, orchestrator))
    }
}
