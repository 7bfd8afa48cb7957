//! Token counting utilities
//!
//! Used to estimate usage when a provider does not report token counts.

use std::sync::OnceLock;
use tiktoken_rs::CoreBPE;
use tracing::{debug, warn};

/// Token counter for a model family
pub struct TokenCounter {
    encoder: CoreBPE,
    encoding: &'static str,
}

impl TokenCounter {
    fn o200k() -> Option<Self> {
        tiktoken_rs::o200k_base().ok().map(|encoder| Self {
            encoder,
            encoding: "o200k_base",
        })
    }

    fn cl100k() -> Option<Self> {
        tiktoken_rs::cl100k_base().ok().map(|encoder| Self {
            encoder,
            encoding: "cl100k_base",
        })
    }

    /// Count tokens in a text string
    pub fn count_tokens(&self, text: &str) -> usize {
        self.encoder.encode_with_special_tokens(text).len()
    }

    /// Name of the underlying encoding
    pub fn encoding(&self) -> &'static str {
        self.encoding
    }
}

static O200K_COUNTER: OnceLock<Option<TokenCounter>> = OnceLock::new();
static CL100K_COUNTER: OnceLock<Option<TokenCounter>> = OnceLock::new();

/// Models from the gpt-4o generation onwards use the o200k encoding
fn uses_o200k(model_name: &str) -> bool {
    model_name.starts_with("gpt-4o")
        || model_name.starts_with("o1")
        || model_name.starts_with("o3")
        || model_name.starts_with("o4")
        || model_name.starts_with("gpt-4.1")
}

/// Get a cached token counter for the given model
pub fn get_token_counter(model_name: &str) -> Option<&'static TokenCounter> {
    let counter = if uses_o200k(model_name) {
        O200K_COUNTER.get_or_init(TokenCounter::o200k)
    } else {
        CL100K_COUNTER.get_or_init(TokenCounter::cl100k)
    };

    if counter.is_none() {
        warn!("No tokenizer available for model {}", model_name);
    }
    counter.as_ref()
}

/// Estimate the number of tokens in `text` for `model_name`.
///
/// Falls back to a four-characters-per-token heuristic when no tokenizer can
/// be loaded.
pub fn estimate_tokens(text: &str, model_name: &str) -> u64 {
    match get_token_counter(model_name) {
        Some(counter) => {
            let count = counter.count_tokens(text) as u64;
            debug!(
                model = model_name,
                encoding = counter.encoding(),
                tokens = count,
                "Estimated token count"
            );
            count
        }
        None => text.chars().count().div_ceil(4) as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_estimation() {
        let text = "Hello, world! This is a test.";
        let count = estimate_tokens(text, "gpt-4o");

        assert!(count > 0);
        assert!(count < 20);
    }

    #[test]
    fn test_encoding_selection() {
        assert!(uses_o200k("gpt-4o-mini"));
        assert!(uses_o200k("o3-mini"));
        assert!(!uses_o200k("gpt-3.5-turbo"));
    }

    #[test]
    fn test_empty_text_has_no_tokens() {
        assert_eq!(estimate_tokens("", "o1"), 0);
    }
}
