//! Web search and scraping document provider

use crate::capabilities::{DocumentProvider, RunContext};
use crate::error::{ResearchError, ResearchResult};
use crate::types::{DocumentBatch, DocumentRecord, ResearchQuery};
use async_trait::async_trait;
use futures::future::{try_join_all, BoxFuture};
use quarry_core::{fan_out_ordered, retry_async, RetryConfig, SearchConfig};
use quarry_llm::{generate_tracked, parse_json_response, GenerationRequest, TextGenerator};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const MODULE: &str = "search";
const MAX_SEARCH_QUERIES: usize = 5;

const QUERY_SYSTEM_PROMPT: &str = "You are a research assistant helping to generate effective search queries. \
Generate 3-5 search queries that would help find relevant information for the research topic.\n\
Respond with a JSON object: {\"queries\": [\"query\", ...]}";

#[derive(Debug, Deserialize)]
struct SearchQueries {
    queries: Vec<String>,
}

/// Subset of a SearxNG JSON response
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    url: String,
}

/// [`DocumentProvider`] that searches a SearxNG-compatible endpoint and
/// scrapes the resulting pages
pub struct WebDocumentProvider {
    generator: Arc<dyn TextGenerator>,
    model: String,
    http: reqwest::Client,
    config: SearchConfig,
    retry: RetryConfig,
}

impl WebDocumentProvider {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        model: impl Into<String>,
        config: SearchConfig,
    ) -> ResearchResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ResearchError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            generator,
            model: model.into(),
            http,
            config,
            retry: RetryConfig {
                max_attempts: 2,
                ..RetryConfig::default()
            },
        })
    }

    /// Retry policy for individual search requests
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn generate_search_queries(
        &self,
        query: &ResearchQuery,
        ctx: &RunContext,
    ) -> ResearchResult<Vec<String>> {
        let request = GenerationRequest::new(&self.model)
            .system(QUERY_SYSTEM_PROMPT)
            .user(format!(
                "Research Query: {}\n\nGenerate search queries that would help find relevant information.",
                serde_json::to_string_pretty(query).unwrap_or_else(|_| query.topic.clone())
            ));

        let response = generate_tracked(
            self.generator.as_ref(),
            &ctx.ledger,
            MODULE,
            "generate_search_queries",
            request,
        )
        .await
        .map_err(|e| ResearchError::from_llm("document provider", e))?;

        let parsed: SearchQueries = parse_json_response(&response)
            .map_err(|e| ResearchError::from_llm("document provider", e))?;

        let queries: Vec<String> = parsed
            .queries
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .take(MAX_SEARCH_QUERIES)
            .collect();

        if queries.is_empty() {
            return Err(ResearchError::validation("No search queries generated"));
        }

        debug!("Search queries generated: {:?}", queries);
        Ok(queries)
    }

    async fn search_web(&self, search_query: &str) -> ResearchResult<Vec<String>> {
        let http = self.http.clone();
        let endpoint = self.config.endpoint.clone();
        let owned_query = search_query.to_string();

        let operation = move || {
            let http = http.clone();
            let endpoint = endpoint.clone();
            let search_query = owned_query.clone();
            let fut: BoxFuture<'static, Result<SearchResponse, reqwest::Error>> =
                Box::pin(async move {
                    http.get(&endpoint)
                        .query(&[("q", search_query.as_str()), ("format", "json")])
                        .send()
                        .await?
                        .error_for_status()?
                        .json::<SearchResponse>()
                        .await
                });
            fut
        };

        let response = retry_async(operation, self.retry.clone(), "web_search")
            .await
            .map_err(|e| {
                warn!("Search for '{}' failed: {}", search_query, e);
                ResearchError::capability_with_source("document provider", "Search request failed", e)
            })?;

        Ok(response
            .results
            .into_iter()
            .map(|hit| hit.url)
            .filter(|url| is_http_url(url))
            .take(self.config.results_per_query)
            .collect())
    }

    /// Fetch a page as plain text. Any failure yields empty content.
    async fn scrape_url(&self, url: &str) -> String {
        let response = match self.http.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Failed to scrape {}: {}", url, e);
                return String::new();
            }
        };

        if !response.status().is_success() {
            warn!("Failed to scrape {}: HTTP {}", url, response.status());
            return String::new();
        }

        match response.text().await {
            Ok(body) => truncate_chars(&html_to_text(&body), self.config.max_content_chars),
            Err(e) => {
                warn!("Failed to read body of {}: {}", url, e);
                String::new()
            }
        }
    }
}

#[async_trait]
impl DocumentProvider for WebDocumentProvider {
    async fn fetch(
        &self,
        query: &ResearchQuery,
        ctx: &RunContext,
    ) -> ResearchResult<DocumentBatch> {
        let search_queries = self.generate_search_queries(query, ctx).await?;

        let url_sets =
            try_join_all(search_queries.iter().map(|q| self.search_web(q))).await?;

        let urls = dedupe_urls(url_sets);
        info!(
            "Found {} unique URLs from {} search queries",
            urls.len(),
            search_queries.len()
        );

        let documents = fan_out_ordered(urls, self.config.max_concurrent_scrapes, |url| async move {
            let content = self.scrape_url(&url).await;
            DocumentRecord::new(url, content)
        })
        .await;

        Ok(DocumentBatch {
            search_queries,
            documents,
        })
    }
}

/// Flatten URL lists, keeping the first occurrence of each URL
pub fn dedupe_urls(url_sets: Vec<Vec<String>>) -> Vec<String> {
    let mut seen = HashSet::new();
    url_sets
        .into_iter()
        .flatten()
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

fn is_http_url(candidate: &str) -> bool {
    Url::parse(candidate)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Truncate to at most `max_chars` characters
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => text[..index].to_string(),
        None => text.to_string(),
    }
}

struct HtmlPatterns {
    hidden: Vec<Regex>,
    block: Regex,
    tag: Regex,
    spaces: Regex,
    blank_lines: Regex,
}

fn html_patterns() -> &'static HtmlPatterns {
    static PATTERNS: OnceLock<HtmlPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let compile = |pattern: &str| Regex::new(pattern).expect("static regex is valid");
        HtmlPatterns {
            hidden: [
                r"(?is)<script\b.*?</script>",
                r"(?is)<style\b.*?</style>",
                r"(?is)<noscript\b.*?</noscript>",
                r"(?is)<svg\b.*?</svg>",
                r"(?s)<!--.*?-->",
            ]
            .into_iter()
            .map(compile)
            .collect(),
            block: compile(r"(?i)<\s*(br|/p|/div|/li|/h[1-6]|/tr|/section|/article)\b[^>]*>"),
            tag: compile(r"(?s)<[^>]+>"),
            spaces: compile(r"[ \t\x{A0}]+"),
            blank_lines: compile(r"\n\s*\n+"),
        }
    })
}

/// Reduce an HTML page to readable text
pub fn html_to_text(html: &str) -> String {
    let patterns = html_patterns();

    let mut text = html.to_string();
    for pattern in &patterns.hidden {
        text = pattern.replace_all(&text, " ").into_owned();
    }
    let text = patterns.block.replace_all(&text, "\n");
    let text = patterns.tag.replace_all(&text, " ");
    let text = decode_entities(&text);
    let text = patterns.spaces.replace_all(&text, " ");

    let text = text
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");
    patterns
        .blank_lines
        .replace_all(&text, "\n\n")
        .trim()
        .to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text() {
        let html = r#"<html><head><title>T</title><style>body { color: red; }</style>
            <script>var x = "<p>";</script></head>
            <body><h1>Heading</h1><p>First &amp; <b>bold</b> paragraph.</p><!-- hidden -->
            <div>Second&nbsp;line</div></body></html>"#;

        let text = html_to_text(html);
        assert!(text.contains("Heading"));
        assert!(text.contains("First & bold paragraph."));
        assert!(text.contains("Second line"));
        assert!(!text.contains("color"));
        assert!(!text.contains("var x"));
        assert!(!text.contains("hidden"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("", 0), "");
    }

    #[test]
    fn test_dedupe_keeps_first_seen_order() {
        let urls = dedupe_urls(vec![
            vec!["https://b".into(), "https://a".into()],
            vec!["https://a".into(), "https://c".into(), "https://b".into()],
        ]);
        assert_eq!(urls, vec!["https://b", "https://a", "https://c"]);
    }

    #[test]
    fn test_only_http_urls_are_kept() {
        assert!(is_http_url("https://example.com/page"));
        assert!(!is_http_url("javascript:alert(1)"));
        assert!(!is_http_url("not a url"));
    }
}
