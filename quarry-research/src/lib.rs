//! Quarry Research - the research pipeline
//!
//! Stages of a run, each behind a capability trait:
//!
//! - **Clarification**: clarifying questions and query refinement
//! - **Search**: web search and scraping
//! - **Summarization**: per-document relevance scoring
//! - **Drafting**: outline, introduction, sections and conclusion
//! - **Finalization**: overview, transitions, references and markdown
//!
//! [`ResearchOrchestrator`] drives the stages, checkpoints the refined query and
//! backtracks to search when a run lacks evidence or a stage fails transiently.

pub mod capabilities;
pub mod clarification;
pub mod drafting;
pub mod error;
pub mod finalize;
pub mod orchestrator;
pub mod search;
pub mod state;
pub mod summarization;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use capabilities::{
    AnswerSource, DocumentProvider, DocumentSummarizer, NoAnswer, QueryRefiner, ReportDrafter,
    ReportFinalizer, RunContext,
};
pub use clarification::{format_clarifying_prompt, LlmQueryRefiner};
pub use drafting::LlmReportDrafter;
pub use error::{ResearchError, ResearchResult};
pub use finalize::{format_references, render_markdown, LlmReportFinalizer};
pub use orchestrator::{ResearchCapabilities, ResearchOrchestrator};
pub use search::WebDocumentProvider;
pub use state::{Checkpoint, RunState, Stage};
pub use summarization::LlmSummarizer;
pub use types::*;

use quarry_core::QuarryConfig;
use quarry_llm::{SiumaiGenerator, TextGenerator};
use std::sync::Arc;

/// Build the LLM- and web-backed capabilities described by `config`
pub fn create_capabilities(
    config: &QuarryConfig,
    generator: Arc<dyn TextGenerator>,
) -> ResearchResult<ResearchCapabilities> {
    let models = &config.models;

    Ok(ResearchCapabilities {
        refiner: Arc::new(LlmQueryRefiner::new(generator.clone(), models)),
        provider: Arc::new(WebDocumentProvider::new(
            generator.clone(),
            &models.search_queries,
            config.search.clone(),
        )?),
        summarizer: Arc::new(LlmSummarizer::new(
            generator.clone(),
            &models.summary,
            config.pipeline.relevance_threshold,
            config.search.max_content_chars,
        )),
        drafter: Arc::new(LlmReportDrafter::new(generator.clone(), models)),
        finalizer: Arc::new(LlmReportFinalizer::new(generator, &models.finalize)),
    })
}

/// Create an orchestrator backed by the configured LLM provider and search endpoint
pub fn create_orchestrator(config: &QuarryConfig) -> ResearchResult<ResearchOrchestrator> {
    config.validate()?;

    let generator: Arc<dyn TextGenerator> = Arc::new(SiumaiGenerator::new(config.llm.clone()));
    let capabilities = create_capabilities(config, generator)?;

    Ok(ResearchOrchestrator::new(
        capabilities,
        config.pipeline.clone(),
    ))
}
