//! Request and response bodies

use chrono::{DateTime, Utc};
use quarry_research::{ResearchOutput, ResearchQuery};
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

/// Successful API response envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Body of `POST /api/clarify`
#[derive(Debug, Deserialize)]
pub struct ClarifyRequest {
    pub topic: String,
}

#[derive(Debug, Serialize)]
pub struct ClarifyResponse {
    pub questions: Vec<String>,
    /// Questions rendered as a single prompt
    pub prompt: String,
}

/// Body of `POST /api/refine`
#[derive(Debug, Deserialize)]
pub struct RefineRequest {
    pub topic: String,
    #[serde(default)]
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Serialize)]
pub struct RefineResponse {
    pub query: ResearchQuery,
}

#[derive(Debug, Serialize)]
pub struct ResearchResponse {
    pub markdown: String,
    pub report: ReportView,
}

/// Client-facing view of a finished report
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportView {
    pub topic: String,
    pub angle: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub sections: Vec<SectionView>,
}

#[derive(Debug, Serialize)]
pub struct SectionView {
    pub heading: String,
    pub content: String,
}

impl From<ResearchOutput> for ResearchResponse {
    fn from(output: ResearchOutput) -> Self {
        let report = output.report;
        Self {
            markdown: output.formatted_report,
            report: ReportView {
                topic: report.query.topic,
                angle: report.query.angle,
                generated_at: report.metadata.generated_at,
                sections: report
                    .content
                    .sections
                    .into_iter()
                    .map(|section| SectionView {
                        heading: section.heading,
                        content: section.content,
                    })
                    .collect(),
            },
        }
    }
}
