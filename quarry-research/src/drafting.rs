//! Outline generation and report drafting

use crate::capabilities::{ReportDrafter, RunContext};
use crate::error::{ResearchError, ResearchResult};
use crate::types::{
    DocumentSummary, OutlineSection, ReportContent, ReportMetadata, ReportSection,
    ResearchOutline, ResearchQuery, ResearchReport,
};
use async_trait::async_trait;
use chrono::Utc;
use futures::future::try_join_all;
use quarry_core::ModelConfig;
use quarry_llm::{generate_tracked, parse_json_response, GenerationRequest, TextGenerator};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

const MODULE: &str = "brain";
const CAPABILITY: &str = "report drafter";

const OUTLINE_SYSTEM_PROMPT: &str = "You are a research expert creating a structured outline for a comprehensive research report.\n\
Based on the available document summaries, create a logical outline that covers the topic thoroughly.\n\
Respond with a JSON object of this shape:\n\
{\"title\": string, \"sections\": [{\"heading\": string, \"subheadings\": [string], \"relevantDocuments\": [url]}]}\n\
Only reference URLs of the available documents.";

const SECTION_SYSTEM_PROMPT: &str = "You are a research expert writing a section of a comprehensive research report.\n\
Use the provided document summaries to write a detailed, well-structured section.\n\
Focus on accuracy, clarity, and logical flow. Include relevant citations.";

const INTRODUCTION_SYSTEM_PROMPT: &str =
    "You are a research expert writing an introduction for a comprehensive research report.";

const CONCLUSION_SYSTEM_PROMPT: &str =
    "You are a research expert writing a conclusion for a comprehensive research report.";

fn to_prompt_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

/// Heading and body pair fed to the conclusion prompt
#[derive(Serialize)]
struct SectionDigest<'a> {
    heading: &'a str,
    content: &'a str,
}

/// LLM-backed [`ReportDrafter`]
pub struct LlmReportDrafter {
    generator: Arc<dyn TextGenerator>,
    outline_model: String,
    drafting_model: String,
}

impl LlmReportDrafter {
    pub fn new(generator: Arc<dyn TextGenerator>, models: &ModelConfig) -> Self {
        Self {
            generator,
            outline_model: models.outline.clone(),
            drafting_model: models.drafting.clone(),
        }
    }

    async fn generate(
        &self,
        model: &str,
        operation: &str,
        system: &str,
        user: String,
        ctx: &RunContext,
    ) -> ResearchResult<String> {
        let request = GenerationRequest::new(model).system(system).user(user);
        generate_tracked(self.generator.as_ref(), &ctx.ledger, MODULE, operation, request)
            .await
            .map_err(|e| ResearchError::from_llm(CAPABILITY, e))
    }

    async fn generate_outline(
        &self,
        query: &ResearchQuery,
        summaries: &[DocumentSummary],
        ctx: &RunContext,
    ) -> ResearchResult<ResearchOutline> {
        let response = self
            .generate(
                &self.outline_model,
                "generate_outline",
                OUTLINE_SYSTEM_PROMPT,
                format!(
                    "Research Query: {}\nAvailable Documents: {}\n\nCreate a structured outline for the research report.",
                    to_prompt_json(query),
                    to_prompt_json(summaries)
                ),
                ctx,
            )
            .await?;

        let mut outline: ResearchOutline = parse_json_response(&response)
            .map_err(|e| ResearchError::from_llm(CAPABILITY, e))?;

        outline
            .sections
            .retain(|section| !section.heading.trim().is_empty());
        if outline.sections.is_empty() {
            return Err(ResearchError::validation("Generated outline has no sections"));
        }

        debug!(
            "Outline '{}' with {} sections",
            outline.title,
            outline.sections.len()
        );
        Ok(outline)
    }

    async fn generate_introduction(
        &self,
        query: &ResearchQuery,
        outline: &ResearchOutline,
        ctx: &RunContext,
    ) -> ResearchResult<String> {
        self.generate(
            &self.drafting_model,
            "generate_introduction",
            INTRODUCTION_SYSTEM_PROMPT,
            format!(
                "Research Query: {}\nReport Outline: {}\n\nWrite an engaging introduction that sets up the research report.",
                to_prompt_json(query),
                to_prompt_json(outline)
            ),
            ctx,
        )
        .await
    }

    async fn generate_section(
        &self,
        section: &OutlineSection,
        summaries: &[DocumentSummary],
        query: &ResearchQuery,
        ctx: &RunContext,
    ) -> ResearchResult<ReportSection> {
        let relevant: Vec<&DocumentSummary> = summaries
            .iter()
            .filter(|summary| section.relevant_documents.contains(&summary.url))
            .collect();

        let content = self
            .generate(
                &self.drafting_model,
                "generate_section",
                SECTION_SYSTEM_PROMPT,
                format!(
                    "Section: {}\nResearch Query: {}\nRelevant Documents: {}\n\nWrite a comprehensive section for the research report. No preamble or postamble, just the section content.",
                    section.heading,
                    to_prompt_json(query),
                    to_prompt_json(&relevant)
                ),
                ctx,
            )
            .await?;

        Ok(ReportSection {
            heading: section.heading.clone(),
            content,
            sources: section.relevant_documents.clone(),
        })
    }

    async fn generate_conclusion(
        &self,
        query: &ResearchQuery,
        sections: &[ReportSection],
        ctx: &RunContext,
    ) -> ResearchResult<String> {
        let digests: Vec<SectionDigest<'_>> = sections
            .iter()
            .map(|section| SectionDigest {
                heading: &section.heading,
                content: &section.content,
            })
            .collect();

        self.generate(
            &self.drafting_model,
            "generate_conclusion",
            CONCLUSION_SYSTEM_PROMPT,
            format!(
                "Research Query: {}\nReport Sections: {}\n\nWrite a conclusion that synthesizes the key findings and insights.",
                to_prompt_json(query),
                to_prompt_json(&digests)
            ),
            ctx,
        )
        .await
    }
}

#[async_trait]
impl ReportDrafter for LlmReportDrafter {
    async fn draft(
        &self,
        query: &ResearchQuery,
        summaries: &[DocumentSummary],
        ctx: &RunContext,
    ) -> ResearchResult<ResearchReport> {
        let outline = self.generate_outline(query, summaries, ctx).await?;
        let introduction = self.generate_introduction(query, &outline, ctx).await?;

        // try_join_all yields results in input order
        let sections = try_join_all(
            outline
                .sections
                .iter()
                .map(|section| self.generate_section(section, summaries, query, ctx)),
        )
        .await?;

        let conclusion = self.generate_conclusion(query, &sections, ctx).await?;

        info!("Drafted report with {} sections", sections.len());

        Ok(ResearchReport {
            query: query.clone(),
            outline,
            content: ReportContent {
                overview: String::new(),
                introduction,
                sections,
                conclusion,
                references: String::new(),
            },
            metadata: ReportMetadata {
                generated_at: Utc::now(),
                sources_used: summaries.to_vec(),
                search_queries: Vec::new(),
                usage_metrics: None,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedGenerator;
    use crate::types::SourceType;
    use quarry_llm::LlmError;

    fn summary(url: &str, title: &str) -> DocumentSummary {
        DocumentSummary {
            title: title.to_string(),
            summary: format!("Summary of {}", title),
            relevance_score: 0.8,
            source_type: SourceType::News,
            extracted_at: Utc::now(),
            url: url.to_string(),
        }
    }

    const OUTLINE: &str = r#"{"title": "Batteries", "sections": [
        {"heading": "Chemistry", "subheadings": [], "relevantDocuments": ["https://a"]},
        {"heading": "Markets", "subheadings": ["Prices"], "relevantDocuments": ["https://b"]},
        {"heading": "Outlook", "relevantDocuments": ["https://a", "https://b"]}
    ]}"#;

    fn respond(request: &GenerationRequest) -> Result<String, LlmError> {
        if request.system.contains("structured outline") {
            return Ok(OUTLINE.to_string());
        }
        if request.system.contains("introduction") {
            return Ok("Intro text".to_string());
        }
        if request.system.contains("conclusion") {
            return Ok("Conclusion text".to_string());
        }
        let heading = request
            .user
            .lines()
            .next()
            .and_then(|line| line.strip_prefix("Section: "))
            .unwrap_or("?");
        Ok(format!("Body of {}", heading))
    }

    #[tokio::test]
    async fn test_draft_keeps_section_order_and_sources() {
        let generator = Arc::new(ScriptedGenerator::new(respond));
        let drafter = LlmReportDrafter::new(generator.clone(), &ModelConfig::default());
        let summaries = vec![summary("https://a", "A"), summary("https://b", "B")];
        let ctx = RunContext::detached();

        let report = drafter
            .draft(&ResearchQuery::new("batteries"), &summaries, &ctx)
            .await
            .unwrap();

        let headings: Vec<&str> = report
            .content
            .sections
            .iter()
            .map(|s| s.heading.as_str())
            .collect();
        assert_eq!(headings, vec!["Chemistry", "Markets", "Outlook"]);
        assert_eq!(report.content.sections[1].content, "Body of Markets");
        assert_eq!(report.content.sections[2].sources, vec!["https://a", "https://b"]);
        assert_eq!(report.content.introduction, "Intro text");
        assert_eq!(report.content.conclusion, "Conclusion text");
        assert_eq!(report.metadata.sources_used.len(), 2);

        // outline + introduction + 3 sections + conclusion
        assert_eq!(ctx.ledger.len(), 6);
        let requests = generator.requests();
        assert_eq!(requests[0].model, "o1");
        assert!(requests[1..].iter().all(|r| r.model == "o3-mini"));
    }

    #[tokio::test]
    async fn test_section_prompt_only_sees_its_documents() {
        let generator = Arc::new(ScriptedGenerator::new(respond));
        let drafter = LlmReportDrafter::new(generator.clone(), &ModelConfig::default());
        let summaries = vec![summary("https://a", "Alpha"), summary("https://b", "Beta")];

        drafter
            .draft(&ResearchQuery::new("batteries"), &summaries, &RunContext::detached())
            .await
            .unwrap();

        let chemistry = generator
            .requests()
            .into_iter()
            .find(|r| r.user.starts_with("Section: Chemistry"))
            .unwrap();
        assert!(chemistry.user.contains("Summary of Alpha"));
        assert!(!chemistry.user.contains("Summary of Beta"));
    }

    #[tokio::test]
    async fn test_empty_outline_is_rejected() {
        let generator = Arc::new(ScriptedGenerator::new(|_| {
            Ok(r#"{"title": "Nothing", "sections": []}"#.to_string())
        }));
        let drafter = LlmReportDrafter::new(generator, &ModelConfig::default());

        let result = drafter
            .draft(&ResearchQuery::new("topic"), &[], &RunContext::detached())
            .await;
        assert!(matches!(result, Err(ResearchError::Validation { .. })));
    }
}
