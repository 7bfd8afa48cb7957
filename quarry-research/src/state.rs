//! Per-run pipeline state and checkpointing

use crate::error::{ResearchError, ResearchResult};
use crate::types::{DocumentSummary, ResearchOutline, ResearchQuery};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Clarification,
    Search,
    Summarization,
    Outline,
    Drafting,
    Final,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Clarification => "clarification",
            Stage::Search => "search",
            Stage::Summarization => "summarization",
            Stage::Outline => "outline",
            Stage::Drafting => "drafting",
            Stage::Final => "final",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable state of one research run
#[derive(Debug, Clone, PartialEq)]
pub struct RunState {
    query: ResearchQuery,
    stage: Stage,
    pub document_summaries: Vec<DocumentSummary>,
    pub search_queries: Vec<String>,
    pub outline: Option<ResearchOutline>,
    /// Section heading to drafted content
    pub partial_drafts: BTreeMap<String, String>,
}

impl RunState {
    /// Fresh state awaiting clarification
    pub fn new(query: ResearchQuery) -> Self {
        Self::at_stage(query, Stage::Clarification)
    }

    /// State for a query that is already refined
    pub fn refined(query: ResearchQuery) -> Self {
        Self::at_stage(query, Stage::Search)
    }

    fn at_stage(query: ResearchQuery, stage: Stage) -> Self {
        Self {
            query,
            stage,
            document_summaries: Vec::new(),
            search_queries: Vec::new(),
            outline: None,
            partial_drafts: BTreeMap::new(),
        }
    }

    pub fn query(&self) -> &ResearchQuery {
        &self.query
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Replace the query with its refined form. Only allowed during clarification.
    pub fn set_query(&mut self, query: ResearchQuery) -> ResearchResult<()> {
        if self.stage != Stage::Clarification {
            return Err(ResearchError::validation(format!(
                "Query can only be refined during clarification, run is at {}",
                self.stage
            )));
        }
        self.query = query;
        Ok(())
    }

    /// Move to a later stage
    pub fn advance(&mut self, next: Stage) -> ResearchResult<()> {
        if next <= self.stage {
            return Err(ResearchError::validation(format!(
                "Cannot move research run from {} to {}",
                self.stage, next
            )));
        }
        self.stage = next;
        Ok(())
    }

    /// Snapshot the current state
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            state: self.clone(),
            captured_at: Utc::now(),
        }
    }

    /// Reset to a previously captured snapshot
    pub fn restore(&mut self, checkpoint: &Checkpoint) {
        *self = checkpoint.state.clone();
    }
}

/// Recoverable snapshot of a [`RunState`], held alongside the live state
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    state: RunState,
    captured_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn stage(&self) -> Stage {
        self.state.stage
    }

    pub fn query(&self) -> &ResearchQuery {
        &self.state.query
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}
