//! Research data model

use crate::error::{ResearchError, ResearchResult};
use chrono::{DateTime, Utc};
use quarry_llm::ResearchMetrics;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// How thorough the research should be
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResearchDepth {
    Basic,
    Intermediate,
    #[default]
    Deep,
}

/// Source preferences extracted from the clarification turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchPreferences {
    pub include_academic: bool,
    pub include_news: bool,
    pub include_market_data: bool,
}

/// Structured research request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchQuery {
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<String>,
    #[serde(default)]
    pub depth: ResearchDepth,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<ResearchPreferences>,
}

impl ResearchQuery {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            angle: None,
            depth: ResearchDepth::default(),
            preferences: None,
        }
    }

    pub fn with_angle(mut self, angle: impl Into<String>) -> Self {
        self.angle = Some(angle.into());
        self
    }

    pub fn with_depth(mut self, depth: ResearchDepth) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_preferences(mut self, preferences: ResearchPreferences) -> Self {
        self.preferences = Some(preferences);
        self
    }

    /// Reject queries without a usable topic
    pub fn validate(&self) -> ResearchResult<()> {
        validate_topic(&self.topic)
    }

    /// The angle to research, or a general overview when none was given
    pub fn angle_or_default(&self) -> &str {
        self.angle
            .as_deref()
            .filter(|angle| !angle.trim().is_empty())
            .unwrap_or("General overview")
    }
}

pub(crate) fn validate_topic(topic: &str) -> ResearchResult<()> {
    if topic.trim().is_empty() {
        return Err(ResearchError::validation("Research topic must not be empty"));
    }
    Ok(())
}

/// A fetched document. Empty content marks a failed scrape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub url: String,
    pub content: String,
}

impl DocumentRecord {
    pub fn new(url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content: content.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Everything a document provider returns for one query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentBatch {
    /// Search queries issued to find the documents
    pub search_queries: Vec<String>,
    pub documents: Vec<DocumentRecord>,
}

/// Kind of source a document came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Academic,
    News,
    Market,
    Other,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Academic => "academic",
            SourceType::News => "news",
            SourceType::Market => "market",
            SourceType::Other => "other",
        }
    }

    /// Heading label used in reference lists
    pub fn label(&self) -> &'static str {
        match self {
            SourceType::Academic => "Academic",
            SourceType::News => "News",
            SourceType::Market => "Market",
            SourceType::Other => "Other",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condensed, scored view of one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub title: String,
    pub summary: String,
    /// Relevance to the query in [0, 1]
    pub relevance_score: f64,
    pub source_type: SourceType,
    pub extracted_at: DateTime<Utc>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineSection {
    pub heading: String,
    #[serde(default)]
    pub subheadings: Vec<String>,
    /// URLs of the summaries this section draws on
    #[serde(default)]
    pub relevant_documents: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchOutline {
    pub title: String,
    pub sections: Vec<OutlineSection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSection {
    pub heading: String,
    pub content: String,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportContent {
    #[serde(default)]
    pub overview: String,
    pub introduction: String,
    pub sections: Vec<ReportSection>,
    pub conclusion: String,
    /// Rendered reference list, filled in during finalization
    #[serde(default)]
    pub references: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    pub sources_used: Vec<DocumentSummary>,
    pub search_queries: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metrics: Option<ResearchMetrics>,
}

/// A drafted (and later finalized) research report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchReport {
    pub query: ResearchQuery,
    pub outline: ResearchOutline,
    pub content: ReportContent,
    pub metadata: ReportMetadata,
}

impl ResearchReport {
    /// Drop outline and section citations that do not point at a known summary.
    ///
    /// Returns the number of citations removed.
    pub fn prune_unknown_sources(&mut self) -> usize {
        let known: HashSet<&str> = self
            .metadata
            .sources_used
            .iter()
            .map(|summary| summary.url.as_str())
            .collect();

        let mut removed = 0;
        for section in &mut self.outline.sections {
            let before = section.relevant_documents.len();
            section
                .relevant_documents
                .retain(|url| known.contains(url.as_str()));
            removed += before - section.relevant_documents.len();
        }
        for section in &mut self.content.sections {
            let before = section.sources.len();
            section.sources.retain(|url| known.contains(url.as_str()));
            removed += before - section.sources.len();
        }
        removed
    }

    /// Every URL cited by a section, in first-cited order
    pub fn cited_urls(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.content
            .sections
            .iter()
            .flat_map(|section| section.sources.iter())
            .map(String::as_str)
            .filter(|url| seen.insert(*url))
            .collect()
    }
}

/// Delivered result of a research run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchOutput {
    /// Final markdown document
    pub formatted_report: String,
    pub report: ResearchReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(url: &str) -> DocumentSummary {
        DocumentSummary {
            title: url.to_string(),
            summary: String::new(),
            relevance_score: 0.5,
            source_type: SourceType::Other,
            extracted_at: Utc::now(),
            url: url.to_string(),
        }
    }

    #[test]
    fn test_query_defaults_and_validation() {
        let query: ResearchQuery = serde_json::from_str(r#"{"topic": "solid-state batteries"}"#).unwrap();
        assert_eq!(query.depth, ResearchDepth::Deep);
        assert_eq!(query.angle_or_default(), "General overview");
        assert!(query.validate().is_ok());

        assert!(ResearchQuery::new("   ").validate().is_err());
    }

    #[test]
    fn test_query_wire_format() {
        let query = ResearchQuery::new("AI in healthcare").with_preferences(ResearchPreferences {
            include_academic: true,
            include_news: false,
            include_market_data: true,
        });
        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(json["depth"], "deep");
        assert_eq!(json["preferences"]["includeMarketData"], true);
        assert!(json.get("angle").is_none());
    }

    #[test]
    fn test_document_record_emptiness() {
        assert!(DocumentRecord::new("https://a.example", " \n\t").is_empty());
        assert!(!DocumentRecord::new("https://a.example", "text").is_empty());
    }

    #[test]
    fn test_prune_unknown_sources() {
        let mut report = ResearchReport {
            query: ResearchQuery::new("topic"),
            outline: ResearchOutline {
                title: "Title".to_string(),
                sections: vec![OutlineSection {
                    heading: "One".to_string(),
                    subheadings: vec![],
                    relevant_documents: vec!["https://a".into(), "https://ghost".into()],
                }],
            },
            content: ReportContent {
                sections: vec![ReportSection {
                    heading: "One".to_string(),
                    content: "Body".to_string(),
                    sources: vec!["https://ghost".into(), "https://a".into(), "https://b".into()],
                }],
                ..ReportContent::default()
            },
            metadata: ReportMetadata {
                generated_at: Utc::now(),
                sources_used: vec![summary("https://a"), summary("https://b")],
                search_queries: vec![],
                usage_metrics: None,
            },
        };

        assert_eq!(report.prune_unknown_sources(), 2);
        assert_eq!(report.outline.sections[0].relevant_documents, vec!["https://a"]);
        assert_eq!(report.cited_urls(), vec!["https://a", "https://b"]);
    }
}
