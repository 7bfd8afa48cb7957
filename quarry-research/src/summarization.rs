//! Per-document relevance scoring and summarization

use crate::capabilities::{DocumentSummarizer, RunContext};
use crate::error::{ResearchError, ResearchResult};
use crate::search::truncate_chars;
use crate::types::{DocumentRecord, DocumentSummary, ResearchQuery, SourceType};
use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use quarry_llm::{
    generate_tracked, parse_optional_json, GenerationRequest, LlmError, TextGenerator,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

const MODULE: &str = "summarization";

const SUMMARY_SYSTEM_PROMPT: &str = "You are a research assistant helping to summarize and evaluate content for relevance to a research topic.\n\
Analyze the content and return a JSON object with the following structure:\n\
{\n\
  \"title\": \"Extracted or inferred title\",\n\
  \"summary\": \"Concise summary focusing on key points (max 200 words)\",\n\
  \"relevanceScore\": number between 0 and 1,\n\
  \"sourceType\": \"academic\" | \"news\" | \"market\" | \"other\"\n\
}\n\
If the content is not relevant (relevanceScore < 0.3) or appears to be spam/low quality, return null.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryPayload {
    title: String,
    summary: String,
    relevance_score: f64,
    #[serde(default = "default_source_type")]
    source_type: SourceType,
}

fn default_source_type() -> SourceType {
    SourceType::Other
}

/// Clamp a model-reported score into [0, 1]
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Drop summaries below `threshold` and sort the rest by descending relevance
pub fn rank_summaries(mut summaries: Vec<DocumentSummary>, threshold: f64) -> Vec<DocumentSummary> {
    summaries.retain(|summary| summary.relevance_score >= threshold);
    summaries.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
    summaries
}

/// LLM-backed [`DocumentSummarizer`]
pub struct LlmSummarizer {
    generator: Arc<dyn TextGenerator>,
    model: String,
    relevance_threshold: f64,
    max_content_chars: usize,
}

impl LlmSummarizer {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        model: impl Into<String>,
        relevance_threshold: f64,
        max_content_chars: usize,
    ) -> Self {
        Self {
            generator,
            model: model.into(),
            relevance_threshold,
            max_content_chars,
        }
    }

    async fn summarize_document(
        &self,
        document: &DocumentRecord,
        query: &ResearchQuery,
        ctx: &RunContext,
    ) -> Result<Option<DocumentSummary>, LlmError> {
        let request = GenerationRequest::new(&self.model)
            .system(SUMMARY_SYSTEM_PROMPT)
            .user(format!(
                "Research Topic: {}\nResearch Angle: {}\nURL: {}\nDate / Time Right Now: {}\nContent to analyze:\n{}",
                query.topic,
                query.angle_or_default(),
                document.url,
                Utc::now().to_rfc3339(),
                truncate_chars(&document.content, self.max_content_chars)
            ));

        let response = generate_tracked(
            self.generator.as_ref(),
            &ctx.ledger,
            MODULE,
            "summarize_content",
            request,
        )
        .await?;

        let Some(payload) = parse_optional_json::<SummaryPayload>(&response)? else {
            debug!("Model marked {} as irrelevant", document.url);
            return Ok(None);
        };

        Ok(Some(DocumentSummary {
            title: payload.title,
            summary: payload.summary,
            relevance_score: clamp_score(payload.relevance_score),
            source_type: payload.source_type,
            extracted_at: Utc::now(),
            url: document.url.clone(),
        }))
    }
}

#[async_trait]
impl DocumentSummarizer for LlmSummarizer {
    async fn summarize(
        &self,
        documents: Vec<DocumentRecord>,
        query: &ResearchQuery,
        ctx: &RunContext,
    ) -> ResearchResult<Vec<DocumentSummary>> {
        info!("Summarizing {} documents", documents.len());

        let results = join_all(
            documents
                .iter()
                .map(|document| self.summarize_document(document, query, ctx)),
        )
        .await;

        let mut summaries = Vec::new();
        for (document, result) in documents.iter().zip(results) {
            match result {
                Ok(Some(summary)) => summaries.push(summary),
                Ok(None) => {}
                Err(e) if e.is_output_error() => {
                    warn!("Dropping {}: unusable summary ({})", document.url, e);
                }
                // Any transport failure fails the whole stage
                Err(e) => {
                    warn!("Failed to summarize {}: {}", document.url, e);
                    return Err(ResearchError::from_llm("document summarizer", e));
                }
            }
        }

        let ranked = rank_summaries(summaries, self.relevance_threshold);
        info!(
            "Kept {} of {} documents after relevance filtering",
            ranked.len(),
            documents.len()
        );
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedGenerator;
    use quarry_llm::LlmResult;

    fn summarizer(generator: Arc<ScriptedGenerator>) -> LlmSummarizer {
        LlmSummarizer::new(generator, "gpt-4o-mini", 0.3, 50)
    }

    fn response_for(url_marker: &str) -> LlmResult<String> {
        let body = match url_marker {
            "a" => r#"{"title": "A", "summary": "about a", "relevanceScore": 0.4, "sourceType": "news"}"#,
            "b" => r#"{"title": "B", "summary": "about b", "relevanceScore": 1.7, "sourceType": "academic"}"#,
            "c" => "null",
            "d" => r#"{"title": "D", "summary": "weak", "relevanceScore": 0.1, "sourceType": "other"}"#,
            "e" => "not json at all",
            _ => r#"{"title": "F", "summary": "fine", "relevanceScore": 0.7}"#,
        };
        Ok(body.to_string())
    }

    fn marker(request: &GenerationRequest) -> String {
        request
            .user
            .lines()
            .find_map(|line| line.strip_prefix("URL: https://"))
            .unwrap_or_default()
            .to_string()
    }

    #[test]
    fn test_clamp_score() {
        assert_eq!(clamp_score(1.5), 1.0);
        assert_eq!(clamp_score(-0.2), 0.0);
        assert_eq!(clamp_score(f64::NAN), 0.0);
        assert_eq!(clamp_score(0.42), 0.42);
    }

    #[tokio::test]
    async fn test_filters_and_sorts_by_relevance() {
        let generator = Arc::new(ScriptedGenerator::new(|request| {
            response_for(&marker(request))
        }));
        let documents = ["a", "b", "c", "d", "e", "f"]
            .iter()
            .map(|m| DocumentRecord::new(format!("https://{}", m), "content"))
            .collect();
        let ctx = RunContext::detached();

        let summaries = summarizer(generator.clone())
            .summarize(documents, &ResearchQuery::new("topic"), &ctx)
            .await
            .unwrap();

        let urls: Vec<&str> = summaries.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(urls, vec!["https://b", "https://f", "https://a"]);
        assert_eq!(summaries[0].relevance_score, 1.0);
        assert_eq!(summaries[1].source_type, SourceType::Other);
        assert!(summaries
            .windows(2)
            .all(|pair| pair[0].relevance_score >= pair[1].relevance_score));
        assert_eq!(ctx.ledger.len(), 6);
    }

    #[tokio::test]
    async fn test_content_is_truncated_in_prompt() {
        let generator = Arc::new(ScriptedGenerator::new(|_| Ok("null".to_string())));
        let long = "x".repeat(500);

        summarizer(generator.clone())
            .summarize(
                vec![DocumentRecord::new("https://long", long)],
                &ResearchQuery::new("topic"),
                &RunContext::detached(),
            )
            .await
            .unwrap();

        let prompt = &generator.requests()[0].user;
        assert!(prompt.ends_with(&"x".repeat(50)));
        assert!(!prompt.contains(&"x".repeat(51)));
    }

    #[tokio::test]
    async fn test_total_outage_is_capability_error() {
        let generator = Arc::new(ScriptedGenerator::new(|_| {
            Err(LlmError::Request("503".to_string()))
        }));
        let result = summarizer(generator)
            .summarize(
                vec![DocumentRecord::new("https://a", "text")],
                &ResearchQuery::new("topic"),
                &RunContext::detached(),
            )
            .await;

        assert!(matches!(result, Err(ResearchError::Capability { .. })));
    }

    #[tokio::test]
    async fn test_single_request_failure_fails_the_stage() {
        let generator = Arc::new(ScriptedGenerator::new(|request| {
            if marker(request) == "down" {
                Err(LlmError::Request("503".to_string()))
            } else {
                response_for("f")
            }
        }));
        let documents = ["a", "b", "down", "c"]
            .iter()
            .map(|m| DocumentRecord::new(format!("https://{}", m), "content"))
            .collect();

        let result = summarizer(generator)
            .summarize(documents, &ResearchQuery::new("topic"), &RunContext::detached())
            .await;

        match result {
            Err(error @ ResearchError::Capability { .. }) => assert!(error.is_retryable()),
            other => panic!("Expected Capability error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_documents_yields_no_summaries() {
        let generator = Arc::new(ScriptedGenerator::new(|_| Ok("null".to_string())));
        let summaries = summarizer(generator)
            .summarize(vec![], &ResearchQuery::new("topic"), &RunContext::detached())
            .await
            .unwrap();
        assert!(summaries.is_empty());
    }
}
