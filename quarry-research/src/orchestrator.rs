//! Research orchestrator
//!
//! Drives a run through clarification, search, summarization, drafting and
//! finalization. After clarification the run state is checkpointed; retryable
//! failures later in the pipeline (including too few relevant documents)
//! restore that checkpoint and search again, up to the configured number of
//! attempts.

use crate::capabilities::{
    AnswerSource, DocumentProvider, DocumentSummarizer, NoAnswer, QueryRefiner, ReportDrafter,
    ReportFinalizer, RunContext,
};
use crate::clarification::format_clarifying_prompt;
use crate::error::{ResearchError, ResearchResult};
use crate::state::{RunState, Stage};
use crate::types::{validate_topic, ResearchOutput, ResearchQuery};
use quarry_core::{performance::measure_async, run_cancellable, sleep_cancellable, PipelineConfig};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// The pluggable stages of the pipeline
#[derive(Clone)]
pub struct ResearchCapabilities {
    pub refiner: Arc<dyn QueryRefiner>,
    pub provider: Arc<dyn DocumentProvider>,
    pub summarizer: Arc<dyn DocumentSummarizer>,
    pub drafter: Arc<dyn ReportDrafter>,
    pub finalizer: Arc<dyn ReportFinalizer>,
}

/// Runs research end to end. Holds no per-run state and can serve
/// concurrent runs.
pub struct ResearchOrchestrator {
    capabilities: ResearchCapabilities,
    answers: Arc<dyn AnswerSource>,
    policy: PipelineConfig,
}

impl ResearchOrchestrator {
    pub fn new(capabilities: ResearchCapabilities, policy: PipelineConfig) -> Self {
        Self {
            capabilities,
            answers: Arc::new(NoAnswer),
            policy,
        }
    }

    /// Use `answers` to respond to clarifying questions during full runs
    pub fn with_answer_source(mut self, answers: Arc<dyn AnswerSource>) -> Self {
        self.answers = answers;
        self
    }

    pub fn policy(&self) -> &PipelineConfig {
        &self.policy
    }

    /// Render clarifying questions as a prompt for the user
    pub fn format_clarifying_prompt(questions: &[String]) -> String {
        format_clarifying_prompt(questions)
    }

    /// Ask the refiner for clarifying questions about `topic`
    pub async fn get_clarifying_questions(&self, topic: &str) -> ResearchResult<Vec<String>> {
        validate_topic(topic)?;
        let ctx = RunContext::detached();
        self.capabilities.refiner.clarify(topic, &ctx).await
    }

    /// Turn the user's answer into a structured query
    pub async fn process_answer(
        &self,
        topic: &str,
        question: &str,
        answer: &str,
    ) -> ResearchResult<ResearchQuery> {
        validate_topic(topic)?;
        let ctx = RunContext::detached();
        self.capabilities
            .refiner
            .refine(topic, question, answer, &ctx)
            .await
    }

    /// Research `topic` starting from clarification
    pub async fn run_full_pipeline(
        &self,
        topic: &str,
        cancel: CancellationToken,
    ) -> ResearchResult<ResearchOutput> {
        validate_topic(topic)?;
        let ctx = RunContext::new(cancel);
        let span = info_span!("research_run", run_id = %ctx.run_id);

        async {
            info!("Starting research for topic: {}", topic);
            let mut state = RunState::new(ResearchQuery::new(topic));

            let query = self.clarify(&state, topic, &ctx).await?;
            state.set_query(query)?;
            state.advance(Stage::Search)?;
            info!("Done with clarification stage");

            self.run_with_recovery(state, &ctx).await
        }
        .instrument(span)
        .await
    }

    /// Research an already structured query, skipping clarification
    pub async fn run_from_refined_query(
        &self,
        query: ResearchQuery,
        cancel: CancellationToken,
    ) -> ResearchResult<ResearchOutput> {
        query.validate()?;
        let ctx = RunContext::new(cancel);
        let span = info_span!("research_run", run_id = %ctx.run_id);

        async {
            info!("Starting research for refined query: {}", query.topic);
            self.run_with_recovery(RunState::refined(query), &ctx).await
        }
        .instrument(span)
        .await
    }

    async fn clarify(
        &self,
        state: &RunState,
        topic: &str,
        ctx: &RunContext,
    ) -> ResearchResult<ResearchQuery> {
        let questions = self
            .run_stage(state, ctx, self.capabilities.refiner.clarify(topic, ctx))
            .await?;
        let prompt = format_clarifying_prompt(&questions);

        let answer = self
            .run_stage(state, ctx, self.answers.answer(topic, &prompt))
            .await?;

        if answer.trim().is_empty() {
            info!("No clarification answer given, researching the topic as stated");
            return Ok(state.query().clone());
        }

        self.run_stage(
            state,
            ctx,
            self.capabilities.refiner.refine(topic, &prompt, &answer, ctx),
        )
        .await
    }

    /// Checkpoint `state` and run the remaining stages, restoring and retrying
    /// on retryable failures
    async fn run_with_recovery(
        &self,
        mut state: RunState,
        ctx: &RunContext,
    ) -> ResearchResult<ResearchOutput> {
        let checkpoint = state.checkpoint();
        let max_attempts = self.policy.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(attempt, max_attempts, "Running pipeline from {}", checkpoint.stage());

            let error = match self.execute(&mut state, ctx).await {
                Ok(output) => {
                    info!(
                        attempt,
                        tokens = ctx.ledger.metrics().total_tokens,
                        "Research completed"
                    );
                    return Ok(output);
                }
                Err(error) => error,
            };

            if !error.is_retryable() {
                error!(stage = %state.stage(), "Research failed: {}", error);
                return Err(error);
            }

            if attempt >= max_attempts {
                error!(attempts = attempt, "Research failed, retry budget exhausted: {}", error);
                return Err(ResearchError::RetryBudgetExhausted {
                    attempts: attempt,
                    last_error: Box::new(error),
                });
            }

            let delay = self.policy.retry.delay_for_attempt(attempt);
            warn!(
                attempt,
                failed_stage = %state.stage(),
                delay_ms = delay.as_millis() as u64,
                "Backtracking to {} checkpoint: {}",
                checkpoint.stage(),
                error
            );

            state.restore(&checkpoint);
            if !sleep_cancellable(delay, &ctx.cancel).await {
                return Err(ResearchError::Cancelled {
                    stage: state.stage(),
                });
            }
        }
    }

    /// Run search through finalization once
    async fn execute(
        &self,
        state: &mut RunState,
        ctx: &RunContext,
    ) -> ResearchResult<ResearchOutput> {
        let query = state.query().clone();

        let batch = self
            .run_stage(state, ctx, self.capabilities.provider.fetch(&query, ctx))
            .await?;
        state.search_queries = batch.search_queries;

        let fetched = batch.documents.len();
        let documents: Vec<_> = batch
            .documents
            .into_iter()
            .filter(|document| !document.is_empty())
            .collect();
        info!(
            "Search found {} documents ({} empty dropped)",
            documents.len(),
            fetched - documents.len()
        );
        state.advance(Stage::Summarization)?;

        let summaries = self
            .run_stage(
                state,
                ctx,
                self.capabilities.summarizer.summarize(documents, &query, ctx),
            )
            .await?;

        let required = self.policy.min_documents;
        if summaries.len() < required {
            warn!(
                "Insufficient relevant documents found ({} < {})",
                summaries.len(),
                required
            );
            return Err(ResearchError::InsufficientEvidence {
                found: summaries.len(),
                required,
            });
        }
        state.document_summaries = summaries;
        state.advance(Stage::Outline)?;

        let mut report = self
            .run_stage(
                state,
                ctx,
                self.capabilities
                    .drafter
                    .draft(&query, &state.document_summaries, ctx),
            )
            .await?;

        let pruned = report.prune_unknown_sources();
        if pruned > 0 {
            warn!("Removed {} citations to unknown documents", pruned);
        }
        report.metadata.search_queries = state.search_queries.clone();
        state.outline = Some(report.outline.clone());
        state.partial_drafts = report
            .content
            .sections
            .iter()
            .map(|section| (section.heading.clone(), section.content.clone()))
            .collect();
        state.advance(Stage::Drafting)?;

        let mut output = self
            .run_stage(state, ctx, self.capabilities.finalizer.finalize(report, ctx))
            .await?;
        output.report.metadata.usage_metrics = Some(ctx.ledger.metrics());
        state.advance(Stage::Final)?;

        Ok(output)
    }

    /// Run one stage's work, timed and raced against cancellation
    async fn run_stage<T, F>(&self, state: &RunState, ctx: &RunContext, work: F) -> ResearchResult<T>
    where
        F: Future<Output = ResearchResult<T>>,
    {
        let stage = state.stage();
        info!("Starting {} stage", stage);

        match measure_async(stage.as_str(), run_cancellable(&ctx.cancel, work)).await {
            Some(result) => result,
            None => {
                warn!("Research cancelled during {} stage", stage);
                Err(ResearchError::Cancelled { stage })
            }
        }
    }
}
