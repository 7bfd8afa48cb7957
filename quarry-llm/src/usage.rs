//! Run-scoped token usage and cost accounting

use crate::pricing::{price_for, ModelPrice, FALLBACK_PRICE};
use crate::types::TokenCount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// One recorded LLM invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub model: String,
    pub tokens: TokenCount,
    /// Pipeline component that made the call
    pub module: String,
    /// Operation within the component
    pub operation: String,
    pub timestamp: DateTime<Utc>,
}

impl UsageRecord {
    pub fn new(
        model: impl Into<String>,
        tokens: TokenCount,
        module: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            tokens,
            module: module.into(),
            operation: operation.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Token and cost totals for a single model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelCost {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub input_cost: f64,
    pub output_cost: f64,
}

/// Aggregated usage for a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchMetrics {
    pub usages: Vec<UsageRecord>,
    pub total_tokens: u64,
    pub cost_estimate: f64,
    pub by_model: BTreeMap<String, ModelCost>,
}

/// Compute metrics from a set of records using the static price table
pub fn compute_metrics(records: &[UsageRecord]) -> ResearchMetrics {
    let mut by_model: BTreeMap<String, ModelCost> = BTreeMap::new();
    let mut total_tokens = 0;

    for record in records {
        total_tokens += record.tokens.total_tokens;
        let entry = by_model.entry(record.model.clone()).or_default();
        entry.input_tokens += record.tokens.prompt_tokens;
        entry.output_tokens += record.tokens.completion_tokens;
    }

    let mut cost_estimate = 0.0;
    for (model, cost) in by_model.iter_mut() {
        let price = price_or_fallback(model);
        cost.input_cost = price.input_cost(cost.input_tokens);
        cost.output_cost = price.output_cost(cost.output_tokens);
        cost_estimate += cost.input_cost + cost.output_cost;
    }

    ResearchMetrics {
        usages: records.to_vec(),
        total_tokens,
        cost_estimate,
        by_model,
    }
}

fn price_or_fallback(model: &str) -> ModelPrice {
    price_for(model).unwrap_or_else(|| {
        warn!(model = model, "No price known for model, using fallback pricing");
        FALLBACK_PRICE
    })
}

/// Cheaply cloneable handle to the usage records of one run
#[derive(Debug, Clone, Default)]
pub struct UsageLedger {
    records: Arc<Mutex<Vec<UsageRecord>>>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<UsageRecord>> {
        // Records are only pushed or cleared, so a poisoned Vec is still valid
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record one invocation
    pub fn track(&self, record: UsageRecord) {
        debug!(
            model = %record.model,
            module = %record.module,
            operation = %record.operation,
            tokens = record.tokens.total_tokens,
            "Recorded LLM usage"
        );
        self.lock().push(record);
    }

    /// Clear all records
    pub fn reset(&self) {
        self.lock().clear();
    }

    /// Snapshot of the recorded invocations
    pub fn records(&self) -> Vec<UsageRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Aggregate token and cost metrics for everything recorded so far
    pub fn metrics(&self) -> ResearchMetrics {
        compute_metrics(&self.records())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(model: &str, prompt: u64, completion: u64) -> UsageRecord {
        UsageRecord::new(model, TokenCount::new(prompt, completion), "test", "op")
    }

    #[test]
    fn test_metrics_per_model() {
        let ledger = UsageLedger::new();
        ledger.track(record("gpt-4o", 1_000_000, 0));
        ledger.track(record("gpt-4o-mini", 0, 1_000_000));
        ledger.track(record("gpt-4o", 0, 100_000));

        let metrics = ledger.metrics();
        assert_eq!(metrics.usages.len(), 3);
        assert_eq!(metrics.total_tokens, 2_100_000);

        let gpt4o = &metrics.by_model["gpt-4o"];
        assert_eq!(gpt4o.input_tokens, 1_000_000);
        assert_eq!(gpt4o.output_tokens, 100_000);
        assert!((gpt4o.input_cost - 2.50).abs() < 1e-9);
        assert!((gpt4o.output_cost - 1.00).abs() < 1e-9);

        let mini = &metrics.by_model["gpt-4o-mini"];
        assert!((mini.output_cost - 0.60).abs() < 1e-9);

        assert!((metrics.cost_estimate - 4.10).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_model_uses_fallback() {
        let metrics = compute_metrics(&[record("mystery-model", 1_000_000, 1_000_000)]);
        assert!((metrics.cost_estimate - 3.00).abs() < 1e-9);
    }

    #[test]
    fn test_reset_then_replay_is_idempotent() {
        let ledger = UsageLedger::new();
        let records = vec![record("o1", 1200, 300), record("o3-mini", 50, 900)];

        ledger.reset();
        records.iter().cloned().for_each(|r| ledger.track(r));
        let first = ledger.metrics();

        ledger.reset();
        assert!(ledger.is_empty());
        records.iter().cloned().for_each(|r| ledger.track(r));
        let second = ledger.metrics();

        assert_eq!(first.total_tokens, second.total_tokens);
        assert_eq!(first.by_model, second.by_model);
        assert_eq!(first.cost_estimate, second.cost_estimate);
    }

    #[test]
    fn test_clones_share_records() {
        let ledger = UsageLedger::new();
        let handle = ledger.clone();
        handle.track(record("o1", 10, 10));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_separate_ledgers_are_isolated() {
        let first = UsageLedger::new();
        let second = UsageLedger::new();
        first.track(record("o1", 10, 10));
        assert!(second.is_empty());
    }
}
