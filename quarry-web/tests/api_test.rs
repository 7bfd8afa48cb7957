//! HTTP API tests against an orchestrator with fake capabilities

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use quarry_core::{PipelineConfig, RetryConfig};
use quarry_research::{
    render_markdown, DocumentBatch, DocumentProvider, DocumentRecord, DocumentSummarizer,
    DocumentSummary, OutlineSection, QueryRefiner, ReportContent, ReportDrafter, ReportFinalizer,
    ReportMetadata, ReportSection, ResearchCapabilities, ResearchDepth, ResearchOrchestrator,
    ResearchOutline, ResearchOutput, ResearchQuery, ResearchReport, ResearchResult, RunContext,
    SourceType,
};
use quarry_web::{create_app, AppState, WebConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct FakeRefiner;

#[async_trait]
impl QueryRefiner for FakeRefiner {
    async fn clarify(&self, _topic: &str, _ctx: &RunContext) -> ResearchResult<Vec<String>> {
        Ok(vec![
            "Which region?".to_string(),
            "Which time frame?".to_string(),
        ])
    }

    async fn refine(
        &self,
        topic: &str,
        _question: &str,
        answer: &str,
        _ctx: &RunContext,
    ) -> ResearchResult<ResearchQuery> {
        Ok(ResearchQuery::new(topic)
            .with_angle(answer)
            .with_depth(ResearchDepth::Intermediate))
    }
}

/// Returns `count` documents for every fetch
struct FixedProvider {
    count: usize,
}

#[async_trait]
impl DocumentProvider for FixedProvider {
    async fn fetch(
        &self,
        query: &ResearchQuery,
        _ctx: &RunContext,
    ) -> ResearchResult<DocumentBatch> {
        Ok(DocumentBatch {
            search_queries: vec![query.topic.clone()],
            documents: (0..self.count)
                .map(|i| {
                    DocumentRecord::new(format!("https://source{}.example", i), format!("Doc {}", i))
                })
                .collect(),
        })
    }
}

struct RelevantSummarizer;

#[async_trait]
impl DocumentSummarizer for RelevantSummarizer {
    async fn summarize(
        &self,
        documents: Vec<DocumentRecord>,
        _query: &ResearchQuery,
        _ctx: &RunContext,
    ) -> ResearchResult<Vec<DocumentSummary>> {
        Ok(documents
            .into_iter()
            .map(|document| DocumentSummary {
                title: document.url.clone(),
                summary: document.content,
                relevance_score: 0.8,
                source_type: SourceType::News,
                extracted_at: Utc::now(),
                url: document.url,
            })
            .collect())
    }
}

struct OneSectionDrafter;

#[async_trait]
impl ReportDrafter for OneSectionDrafter {
    async fn draft(
        &self,
        query: &ResearchQuery,
        summaries: &[DocumentSummary],
        _ctx: &RunContext,
    ) -> ResearchResult<ResearchReport> {
        let urls: Vec<String> = summaries.iter().map(|s| s.url.clone()).collect();
        Ok(ResearchReport {
            query: query.clone(),
            outline: ResearchOutline {
                title: query.topic.clone(),
                sections: vec![OutlineSection {
                    heading: "Findings".to_string(),
                    subheadings: vec![],
                    relevant_documents: urls.clone(),
                }],
            },
            content: ReportContent {
                introduction: "Introduction.".to_string(),
                sections: vec![ReportSection {
                    heading: "Findings".to_string(),
                    content: "What the sources say.".to_string(),
                    sources: urls,
                }],
                conclusion: "Conclusion.".to_string(),
                ..ReportContent::default()
            },
            metadata: ReportMetadata {
                generated_at: Utc::now(),
                sources_used: summaries.to_vec(),
                search_queries: vec![],
                usage_metrics: None,
            },
        })
    }
}

struct MarkdownFinalizer;

#[async_trait]
impl ReportFinalizer for MarkdownFinalizer {
    async fn finalize(
        &self,
        report: ResearchReport,
        _ctx: &RunContext,
    ) -> ResearchResult<ResearchOutput> {
        Ok(ResearchOutput {
            formatted_report: render_markdown(&report),
            report,
        })
    }
}

fn app(documents: usize) -> Router {
    let capabilities = ResearchCapabilities {
        refiner: Arc::new(FakeRefiner),
        provider: Arc::new(FixedProvider { count: documents }),
        summarizer: Arc::new(RelevantSummarizer),
        drafter: Arc::new(OneSectionDrafter),
        finalizer: Arc::new(MarkdownFinalizer),
    };
    let policy = PipelineConfig {
        min_documents: 3,
        relevance_threshold: 0.3,
        retry: RetryConfig::immediate(2),
    };

    let orchestrator = ResearchOrchestrator::new(capabilities, policy);
    create_app(AppState::new(WebConfig::default(), orchestrator))
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health_check() {
    let response = app(3)
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_research_returns_markdown_and_report() {
    let (status, body) = post_json(
        app(4),
        "/api/research",
        json!({"topic": "Heat pumps", "angle": "Cold climates", "depth": "basic"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let data = &body["data"];
    assert!(data["markdown"].as_str().unwrap().contains("Findings"));
    assert_eq!(data["report"]["topic"], "Heat pumps");
    assert_eq!(data["report"]["angle"], "Cold climates");
    assert!(data["report"]["generatedAt"].is_string());
    assert_eq!(data["report"]["sections"][0]["heading"], "Findings");
    assert_eq!(
        data["report"]["sections"][0]["content"],
        "What the sources say."
    );
}

#[tokio::test]
async fn test_empty_topic_is_bad_request() {
    let (status, body) = post_json(app(4), "/api/research", json!({"topic": "  "})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Invalid input");
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let (status, body) = post_json(app(4), "/api/research", json!({"angle": "no topic"})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_insufficient_evidence_is_bad_gateway() {
    let (status, body) = post_json(app(1), "/api/research", json!({"topic": "Heat pumps"})).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("2 attempts"));
}

#[tokio::test]
async fn test_clarify_returns_questions_and_prompt() {
    let (status, body) = post_json(app(3), "/api/clarify", json!({"topic": "Heat pumps"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["questions"].as_array().unwrap().len(), 2);
    assert!(body["data"]["prompt"]
        .as_str()
        .unwrap()
        .contains(" - Which region?"));
}

#[tokio::test]
async fn test_refine_returns_structured_query() {
    let (status, body) = post_json(
        app(3),
        "/api/refine",
        json!({"topic": "Heat pumps", "question": "Which region?", "answer": "Nordics"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["query"]["topic"], "Heat pumps");
    assert_eq!(body["data"]["query"]["angle"], "Nordics");
    assert_eq!(body["data"]["query"]["depth"], "intermediate");
}

#[tokio::test]
async fn test_clarify_rejects_empty_topic() {
    let (status, _) = post_json(app(3), "/api/clarify", json!({"topic": ""})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
