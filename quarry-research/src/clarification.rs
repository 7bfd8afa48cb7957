//! Clarifying questions and query refinement

use crate::capabilities::{QueryRefiner, RunContext};
use crate::error::{ResearchError, ResearchResult};
use crate::types::ResearchQuery;
use async_trait::async_trait;
use quarry_core::ModelConfig;
use quarry_llm::{generate_tracked, parse_json_response, GenerationRequest, TextGenerator};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

const MODULE: &str = "clarification";

const CLARIFY_SYSTEM_PROMPT: &str = "You are a research assistant helping to clarify research topics. \
Generate 2-3 key questions that would help refine and focus the research direction. \
Questions should be concise and specific.\n\
Respond with a JSON object: {\"chainOfThought\": \"your reasoning\", \"questions\": [\"question\", ...]}";

const REFINE_SYSTEM_PROMPT: &str = "You are a research assistant helping to structure research queries. \
Based on the user's answer, extract relevant preferences and research parameters.\n\
Respond with a JSON object of this shape:\n\
{\"topic\": string, \"angle\": string (optional), \"depth\": \"basic\" | \"intermediate\" | \"deep\", \
\"preferences\": {\"includeAcademic\": boolean, \"includeNews\": boolean, \"includeMarketData\": boolean} (optional)}";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClarifyingQuestions {
    #[serde(default)]
    chain_of_thought: Option<String>,
    questions: Vec<String>,
}

/// Render questions as the prompt shown to the user
pub fn format_clarifying_prompt(questions: &[String]) -> String {
    let listed = questions
        .iter()
        .map(|question| format!(" - {}", question))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Got it. To help me better understand your research needs, could you please answer these clarifying questions:\n{}",
        listed
    )
}

/// LLM-backed [`QueryRefiner`]
pub struct LlmQueryRefiner {
    generator: Arc<dyn TextGenerator>,
    clarification_model: String,
    refinement_model: String,
}

impl LlmQueryRefiner {
    pub fn new(generator: Arc<dyn TextGenerator>, models: &ModelConfig) -> Self {
        Self {
            generator,
            clarification_model: models.clarification.clone(),
            refinement_model: models.refinement.clone(),
        }
    }
}

#[async_trait]
impl QueryRefiner for LlmQueryRefiner {
    async fn clarify(&self, topic: &str, ctx: &RunContext) -> ResearchResult<Vec<String>> {
        let request = GenerationRequest::new(&self.clarification_model)
            .system(CLARIFY_SYSTEM_PROMPT)
            .user(format!(
                "Initial user query: {}\nGenerate clarifying questions for the user so we can better understand their research needs. Make sure to note your chain of thought as you are generating the questions.",
                topic
            ));

        let response =
            generate_tracked(self.generator.as_ref(), &ctx.ledger, MODULE, "clarify", request)
                .await
                .map_err(|e| ResearchError::from_llm("query refiner", e))?;

        let parsed: ClarifyingQuestions = parse_json_response(&response)
            .map_err(|e| ResearchError::from_llm("query refiner", e))?;

        if let Some(reasoning) = &parsed.chain_of_thought {
            debug!("Clarification reasoning: {}", reasoning);
        }

        let questions: Vec<String> = parsed
            .questions
            .into_iter()
            .map(|question| question.trim().to_string())
            .filter(|question| !question.is_empty())
            .collect();

        if questions.is_empty() {
            return Err(ResearchError::validation("No clarifying questions generated"));
        }

        info!("Generated {} clarifying questions", questions.len());
        Ok(questions)
    }

    async fn refine(
        &self,
        topic: &str,
        question: &str,
        answer: &str,
        ctx: &RunContext,
    ) -> ResearchResult<ResearchQuery> {
        let request = GenerationRequest::new(&self.refinement_model)
            .system(REFINE_SYSTEM_PROMPT)
            .user(format!(
                "Topic: {}\nQuestion: {}\nAnswer: {}\n\nExtract research parameters in JSON format matching the ResearchQuery type.",
                topic, question, answer
            ));

        let response = generate_tracked(
            self.generator.as_ref(),
            &ctx.ledger,
            MODULE,
            "process_answer",
            request,
        )
        .await
        .map_err(|e| ResearchError::from_llm("query refiner", e))?;

        let mut query: ResearchQuery = parse_json_response(&response)
            .map_err(|e| ResearchError::from_llm("query refiner", e))?;

        if query.topic.trim().is_empty() {
            warn!("Refined query dropped the topic, keeping the original");
            query.topic = topic.to_string();
        }
        if query.angle.as_deref().is_some_and(|angle| angle.trim().is_empty()) {
            query.angle = None;
        }
        query.validate()?;

        info!(
            topic = %query.topic,
            depth = ?query.depth,
            "Refined research query"
        );
        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedGenerator;
    use crate::types::ResearchDepth;
    use quarry_llm::LlmError;

    fn refiner(generator: Arc<ScriptedGenerator>) -> LlmQueryRefiner {
        LlmQueryRefiner::new(generator, &ModelConfig::default())
    }

    #[test]
    fn test_format_clarifying_prompt() {
        let prompt = format_clarifying_prompt(&[
            "Which region?".to_string(),
            "Which time frame?".to_string(),
        ]);
        assert!(prompt.starts_with("Got it. To help me better understand"));
        assert!(prompt.ends_with(" - Which region?\n - Which time frame?"));
    }

    #[tokio::test]
    async fn test_clarify_parses_questions_and_tracks_usage() {
        let generator = Arc::new(ScriptedGenerator::new(|_| {
            Ok(r#"{"chainOfThought": "scope is broad", "questions": ["Which region?", " ", "Which sector?"]}"#.to_string())
        }));
        let ctx = RunContext::detached();

        let questions = refiner(generator.clone())
            .clarify("AI in healthcare", &ctx)
            .await
            .unwrap();

        assert_eq!(questions, vec!["Which region?", "Which sector?"]);
        assert_eq!(generator.requests()[0].model, "gpt-4o");
        let records = ctx.ledger.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].module, "clarification");
    }

    #[tokio::test]
    async fn test_clarify_without_questions_is_validation_error() {
        let generator = Arc::new(ScriptedGenerator::new(|_| Ok(r#"{"questions": []}"#.to_string())));
        let result = refiner(generator).clarify("topic", &RunContext::detached()).await;
        assert!(matches!(result, Err(ResearchError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_refine_builds_query() {
        let generator = Arc::new(ScriptedGenerator::new(|_| {
            Ok(r#"Sure: {"topic": "AI in healthcare", "angle": "diagnostics", "depth": "intermediate",
                "preferences": {"includeAcademic": true, "includeNews": false, "includeMarketData": false}}"#
                .to_string())
        }));

        let query = refiner(generator.clone())
            .refine("AI healthcare", "Which area?", "Diagnostics", &RunContext::detached())
            .await
            .unwrap();

        assert_eq!(query.angle.as_deref(), Some("diagnostics"));
        assert_eq!(query.depth, ResearchDepth::Intermediate);
        assert!(query.preferences.unwrap().include_academic);
        assert_eq!(generator.requests()[0].model, "o3-mini");
        assert!(generator.requests()[0].user.contains("Answer: Diagnostics"));
    }

    #[tokio::test]
    async fn test_refine_keeps_original_topic_when_missing() {
        let generator = Arc::new(ScriptedGenerator::new(|_| {
            Ok(r#"{"topic": "", "angle": ""}"#.to_string())
        }));

        let query = refiner(generator)
            .refine("quantum sensing", "q", "a", &RunContext::detached())
            .await
            .unwrap();

        assert_eq!(query.topic, "quantum sensing");
        assert_eq!(query.angle, None);
        assert_eq!(query.depth, ResearchDepth::Deep);
    }

    #[tokio::test]
    async fn test_transport_failure_is_capability_error() {
        let generator = Arc::new(ScriptedGenerator::new(|_| {
            Err(LlmError::Request("connection reset".to_string()))
        }));
        let result = refiner(generator).clarify("topic", &RunContext::detached()).await;
        assert!(matches!(result, Err(ResearchError::Capability { .. })));
    }
}
