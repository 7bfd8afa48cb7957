//! Report polishing, reference formatting and markdown rendering

use crate::capabilities::{ReportFinalizer, RunContext};
use crate::error::{ResearchError, ResearchResult};
use crate::types::{DocumentSummary, ReportSection, ResearchOutput, ResearchReport, SourceType};
use async_trait::async_trait;
use futures::future::try_join_all;
use quarry_llm::{generate_tracked, GenerationRequest, TextGenerator};
use std::collections::HashSet;
use std::fmt::Write;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

const MODULE: &str = "finalize";
const CAPABILITY: &str = "report finalizer";

const OVERVIEW_SYSTEM_PROMPT: &str = "You are a research expert crafting a clear, engaging overview of a research report. \
Create a brief overview that introduces the topic broadly and sets up the detailed introduction that follows.";

const TRANSITION_SYSTEM_PROMPT: &str = "You are a research expert creating smooth transitions between sections of a research report. \
Create a brief transition sentence that connects the previous section to the next one.";

const POLISH_SYSTEM_PROMPT: &str = "You are a research editor polishing a final report in markdown format. Your task is to:\n\
1. Ensure the overview and introduction are distinct and complementary\n\
2. Review section transitions and enhance if needed\n\
3. Ensure the conclusion synthesizes key findings without introducing new information\n\
4. Remove any redundant content between sections\n\
5. Maintain all markdown formatting\n\n\
Return the complete polished markdown, preserving all sections and formatting.";

/// Render the reference list for the sources the sections actually cite.
///
/// Sources are grouped by type and ordered by type, then title. Returns an
/// empty string when nothing is cited.
pub fn format_references(sources: &[DocumentSummary], sections: &[ReportSection]) -> String {
    let cited: HashSet<&str> = sections
        .iter()
        .flat_map(|section| section.sources.iter().map(String::as_str))
        .collect();

    let mut used: Vec<&DocumentSummary> = sources
        .iter()
        .filter(|source| cited.contains(source.url.as_str()))
        .collect();

    if used.is_empty() {
        return String::new();
    }

    used.sort_by(|a, b| {
        a.source_type
            .as_str()
            .cmp(b.source_type.as_str())
            .then_with(|| a.title.cmp(&b.title))
    });

    let mut text = String::from("## References\n\n");
    for group in used.chunk_by(|a, b| a.source_type == b.source_type) {
        let _ = write!(text, "### {} Sources\n\n", group[0].source_type.label());
        for (index, source) in group.iter().enumerate() {
            let _ = writeln!(text, "{}. {}", index + 1, format_reference(source));
        }
        text.push('\n');
    }
    text
}

fn format_reference(source: &DocumentSummary) -> String {
    match source.source_type {
        SourceType::Academic => format!("{}. Retrieved from {}", source.title, source.url),
        _ => {
            let host = Url::parse(&source.url)
                .ok()
                .and_then(|url| url.host_str().map(str::to_string))
                .unwrap_or_else(|| source.url.clone());
            format!("{}. {}", source.title, host)
        }
    }
}

/// Assemble the report as a markdown document
pub fn render_markdown(report: &ResearchReport) -> String {
    let query = &report.query;
    let content = &report.content;

    let mut markdown = format!("# {}\n", query.topic);
    if let Some(angle) = query.angle.as_deref().filter(|a| !a.trim().is_empty()) {
        let _ = write!(markdown, "\n*Research Angle: {}*\n", angle);
    }

    let _ = write!(
        markdown,
        "\n## Overview\n\n{}\n\n## Introduction\n\n{}\n\n",
        content.overview.trim(),
        content.introduction.trim()
    );

    let sections = content
        .sections
        .iter()
        .map(|section| format!("## {}\n\n{}", section.heading, section.content.trim()))
        .collect::<Vec<_>>()
        .join("\n\n");
    markdown.push_str(&sections);

    let _ = write!(
        markdown,
        "\n\n## Conclusion\n\n{}\n\n{}\n\n---\n\n*Report generated on {}*",
        content.conclusion.trim(),
        content.references.trim_end(),
        report.metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    markdown
}

/// LLM-backed [`ReportFinalizer`]
pub struct LlmReportFinalizer {
    generator: Arc<dyn TextGenerator>,
    model: String,
}

impl LlmReportFinalizer {
    pub fn new(generator: Arc<dyn TextGenerator>, model: impl Into<String>) -> Self {
        Self {
            generator,
            model: model.into(),
        }
    }

    async fn generate(
        &self,
        operation: &str,
        system: &str,
        user: String,
        ctx: &RunContext,
    ) -> ResearchResult<String> {
        let request = GenerationRequest::new(&self.model).system(system).user(user);
        generate_tracked(self.generator.as_ref(), &ctx.ledger, MODULE, operation, request)
            .await
            .map_err(|e| ResearchError::from_llm(CAPABILITY, e))
    }

    async fn generate_overview(
        &self,
        report: &ResearchReport,
        ctx: &RunContext,
    ) -> ResearchResult<String> {
        self.generate(
            "generate_overview",
            OVERVIEW_SYSTEM_PROMPT,
            format!(
                "Topic: {}\nAngle: {}\nIntroduction: {}\n\nCreate a concise overview (2-3 sentences) that introduces the topic broadly and leads into the introduction.",
                report.query.topic,
                report.query.angle_or_default(),
                report.content.introduction
            ),
            ctx,
        )
        .await
    }

    async fn generate_transition(
        &self,
        previous: &ReportSection,
        next: &ReportSection,
        ctx: &RunContext,
    ) -> ResearchResult<String> {
        let last_paragraph = previous.content.lines().last().unwrap_or_default();
        let first_paragraph = next.content.lines().next().unwrap_or_default();

        self.generate(
            "generate_transition",
            TRANSITION_SYSTEM_PROMPT,
            format!(
                "Previous Section: {}\nPrevious Content (last paragraph): {}\n\nNext Section: {}\nNext Content (first paragraph): {}\n\nCreate a single sentence that smoothly transitions between these sections.",
                previous.heading, last_paragraph, next.heading, first_paragraph
            ),
            ctx,
        )
        .await
    }

    /// One transition per section; the first section gets none
    async fn generate_transitions(
        &self,
        sections: &[ReportSection],
        ctx: &RunContext,
    ) -> ResearchResult<Vec<String>> {
        let transitions = try_join_all(
            sections
                .windows(2)
                .map(|pair| self.generate_transition(&pair[0], &pair[1], ctx)),
        )
        .await?;

        let mut all = Vec::with_capacity(sections.len());
        if !sections.is_empty() {
            all.push(String::new());
        }
        all.extend(transitions);
        Ok(all)
    }

    async fn polish_markdown(&self, markdown: &str, ctx: &RunContext) -> ResearchResult<String> {
        let polished = self
            .generate(
                "polish_markdown",
                POLISH_SYSTEM_PROMPT,
                markdown.to_string(),
                ctx,
            )
            .await?;

        if polished.trim().is_empty() {
            warn!("Polish pass returned no content, keeping unpolished report");
            return Ok(markdown.to_string());
        }
        Ok(polished)
    }
}

#[async_trait]
impl ReportFinalizer for LlmReportFinalizer {
    async fn finalize(
        &self,
        mut report: ResearchReport,
        ctx: &RunContext,
    ) -> ResearchResult<ResearchOutput> {
        let (overview, transitions) = tokio::try_join!(
            self.generate_overview(&report, ctx),
            self.generate_transitions(&report.content.sections, ctx)
        )?;

        report.content.overview = overview.trim().to_string();
        for (section, transition) in report.content.sections.iter_mut().zip(transitions) {
            let transition = transition.trim();
            if !transition.is_empty() {
                section.content = format!("{}\n\n{}", transition, section.content.trim());
            }
        }

        report.content.references =
            format_references(&report.metadata.sources_used, &report.content.sections);

        let markdown = render_markdown(&report);
        let formatted_report = self.polish_markdown(&markdown, ctx).await?;

        info!(
            "Finalized report ({} chars, {} sections)",
            formatted_report.len(),
            report.content.sections.len()
        );

        Ok(ResearchOutput {
            formatted_report,
            report,
        })
    }
}
