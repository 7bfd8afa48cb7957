//! Configuration data types

use crate::async_utils::RetryConfig;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarryConfig {
    pub llm: LlmConfig,
    #[serde(default)]
    pub models: ModelConfig,
    pub search: SearchConfig,
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider type (openai, anthropic, ollama, groq)
    pub provider: String,
    /// API key (optional, can be set via environment)
    pub api_key: Option<String>,
    /// Base URL for custom providers
    pub base_url: Option<String>,
    /// Temperature for generation
    pub temperature: f32,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
}

/// Model assignment per pipeline operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Clarifying question generation
    pub clarification: String,
    /// Turning an answer into a structured query
    pub refinement: String,
    /// Search query generation
    pub search_queries: String,
    /// Per-document summaries
    pub summary: String,
    /// Report outline
    pub outline: String,
    /// Introduction, sections and conclusion
    pub drafting: String,
    /// Overview, transitions and final polish
    pub finalize: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            clarification: "gpt-4o".to_string(),
            refinement: "o3-mini".to_string(),
            search_queries: "o3-mini".to_string(),
            summary: "gpt-4o-mini".to_string(),
            outline: "o1".to_string(),
            drafting: "o3-mini".to_string(),
            finalize: "o3-mini".to_string(),
        }
    }
}

/// Web search and scraping configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// SearxNG-compatible JSON search endpoint
    pub endpoint: String,
    /// URLs kept per search query
    pub results_per_query: usize,
    /// Content is truncated to this many characters before summarization
    pub max_content_chars: usize,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Maximum in-flight scrape requests
    pub max_concurrent_scrapes: usize,
    /// User agent sent with search and scrape requests
    pub user_agent: String,
}

/// Orchestration policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Minimum retained summaries before drafting may start
    pub min_documents: usize,
    /// Summaries scored below this are dropped
    pub relevance_threshold: f64,
    /// Backtrack/retry policy
    pub retry: RetryConfig,
}
