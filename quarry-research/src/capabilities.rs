//! Capability seams of the research pipeline
//!
//! Each stage is a trait object injected into the orchestrator, so any stage
//! can be replaced by a fake in tests or by another backend.

use crate::error::ResearchResult;
use crate::types::{
    DocumentBatch, DocumentRecord, DocumentSummary, ResearchOutput, ResearchQuery, ResearchReport,
};
use async_trait::async_trait;
use quarry_llm::UsageLedger;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Per-run context handed to every capability call
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub ledger: UsageLedger,
    pub cancel: CancellationToken,
}

impl RunContext {
    /// New context with an empty ledger
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            ledger: UsageLedger::new(),
            cancel,
        }
    }

    /// Context for one-off calls outside a run
    pub fn detached() -> Self {
        Self::new(CancellationToken::new())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Turns a raw topic into a structured query
#[async_trait]
pub trait QueryRefiner: Send + Sync {
    /// Questions that would help narrow the topic
    async fn clarify(&self, topic: &str, ctx: &RunContext) -> ResearchResult<Vec<String>>;

    /// Structure the topic using the user's answer
    async fn refine(
        &self,
        topic: &str,
        question: &str,
        answer: &str,
        ctx: &RunContext,
    ) -> ResearchResult<ResearchQuery>;
}

/// Finds and fetches documents for a query
#[async_trait]
pub trait DocumentProvider: Send + Sync {
    /// May include entries with empty content; callers filter them.
    async fn fetch(&self, query: &ResearchQuery, ctx: &RunContext)
        -> ResearchResult<DocumentBatch>;
}

/// Scores and condenses documents
#[async_trait]
pub trait DocumentSummarizer: Send + Sync {
    /// Returns relevant summaries only, sorted by descending relevance
    async fn summarize(
        &self,
        documents: Vec<DocumentRecord>,
        query: &ResearchQuery,
        ctx: &RunContext,
    ) -> ResearchResult<Vec<DocumentSummary>>;
}

/// Produces the outline and prose of a report
#[async_trait]
pub trait ReportDrafter: Send + Sync {
    async fn draft(
        &self,
        query: &ResearchQuery,
        summaries: &[DocumentSummary],
        ctx: &RunContext,
    ) -> ResearchResult<ResearchReport>;
}

/// Polishes a drafted report into its delivered form
#[async_trait]
pub trait ReportFinalizer: Send + Sync {
    async fn finalize(
        &self,
        report: ResearchReport,
        ctx: &RunContext,
    ) -> ResearchResult<ResearchOutput>;
}

/// Supplies the user's answer to clarifying questions
#[async_trait]
pub trait AnswerSource: Send + Sync {
    async fn answer(&self, topic: &str, prompt: &str) -> ResearchResult<String>;
}

/// Answer source for non-interactive runs; always answers with nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAnswer;

#[async_trait]
impl AnswerSource for NoAnswer {
    async fn answer(&self, _topic: &str, _prompt: &str) -> ResearchResult<String> {
        Ok(String::new())
    }
}
