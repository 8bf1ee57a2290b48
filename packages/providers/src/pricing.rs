// ABOUTME: Embedded per-model pricing table and cost computation
// ABOUTME: Rates are USD per million tokens, keyed by provider id then model id

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::Deserialize;

/// USD per million tokens.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Rate {
    pub input: f64,
    pub output: f64,
}

static PRICING: Lazy<HashMap<String, HashMap<String, Rate>>> = Lazy::new(|| {
    serde_json::from_str(include_str!("../config/pricing.json"))
        .expect("invalid embedded pricing table")
});

pub fn rate_for(provider_id: &str, model: &str) -> Option<Rate> {
    PRICING.get(provider_id).and_then(|models| models.get(model)).copied()
}

pub fn cost_usd(rate: Rate, input_tokens: u64, output_tokens: u64) -> f64 {
    (input_tokens as f64 * rate.input + output_tokens as f64 * rate.output) / 1_000_000.0
}
