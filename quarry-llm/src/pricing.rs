//! Static model price table (USD per million tokens)

use serde::{Deserialize, Serialize};

/// Input and output prices for one model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl ModelPrice {
    pub const fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }

    pub fn input_cost(&self, tokens: u64) -> f64 {
        tokens as f64 / 1_000_000.0 * self.input_per_million
    }

    pub fn output_cost(&self, tokens: u64) -> f64 {
        tokens as f64 / 1_000_000.0 * self.output_per_million
    }
}

/// Used for models missing from [`PRICE_TABLE`]
pub const FALLBACK_PRICE: ModelPrice = ModelPrice::new(1.00, 2.00);

/// Known models. More specific names come first so prefix matching picks them.
pub const PRICE_TABLE: &[(&str, ModelPrice)] = &[
    ("gpt-4o-mini", ModelPrice::new(0.15, 0.60)),
    ("gpt-4o", ModelPrice::new(2.50, 10.00)),
    ("o1", ModelPrice::new(15.00, 60.00)),
    ("o3-mini", ModelPrice::new(1.10, 4.40)),
];

/// Look up a model, accepting dated snapshots such as `gpt-4o-2024-08-06`
pub fn price_for(model: &str) -> Option<ModelPrice> {
    PRICE_TABLE
        .iter()
        .find(|(name, _)| {
            model == *name
                || model
                    .strip_prefix(name)
                    .is_some_and(|rest| rest.starts_with('-'))
        })
        .map(|(_, price)| *price)
}
