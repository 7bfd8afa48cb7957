//! Quarry LLM - model access for the research pipeline
//!
//! Wraps siumai behind the [`TextGenerator`] trait and provides structured
//! output parsing, token estimation and run-scoped usage/cost accounting.

pub mod llm_client;
pub mod pricing;
pub mod structured;
pub mod token_counter;
pub mod types;
pub mod usage;

pub use llm_client::{generate_tracked, SiumaiGenerator, TextGenerator};
pub use pricing::{price_for, ModelPrice, FALLBACK_PRICE, PRICE_TABLE};
pub use structured::{extract_json, parse_json_response, parse_optional_json};
pub use token_counter::{estimate_tokens, get_token_counter, TokenCounter};
pub use types::{Generation, GenerationRequest, LlmError, LlmResult, TokenCount};
pub use usage::{compute_metrics, ModelCost, ResearchMetrics, UsageLedger, UsageRecord};
