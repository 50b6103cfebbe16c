//! Per-model cost estimation, grounded in `api_pool.py::get_cost_estimate`.
//!
//! Not part of any control-flow decision; purely advisory numbers a
//! caller can surface for budgeting. The pricing table is static and
//! approximate, same caveat the original carries in its comment.

use std::collections::HashMap;

/// Input/output price per 1,000 tokens, in USD.
#[derive(Debug, Clone, Copy)]
struct ModelPricing {
    input: f64,
    output: f64,
}

const DEFAULT_PRICING: ModelPricing = ModelPricing {
    input: 0.01,
    output: 0.02,
};

fn pricing_table() -> &'static [(&'static str, ModelPricing)] {
    &[
        ("gpt-5", ModelPricing { input: 0.05, output: 0.10 }),
        ("gpt-4", ModelPricing { input: 0.03, output: 0.06 }),
        ("gpt-4-turbo", ModelPricing { input: 0.01, output: 0.03 }),
        ("gpt-3.5-turbo", ModelPricing { input: 0.0005, output: 0.0015 }),
        ("claude-4.6-opus", ModelPricing { input: 0.015, output: 0.075 }),
        ("claude-4.6-sonnet", ModelPricing { input: 0.003, output: 0.015 }),
        ("claude-3-opus", ModelPricing { input: 0.015, output: 0.075 }),
        ("claude-3-sonnet", ModelPricing { input: 0.003, output: 0.015 }),
        ("claude-3-haiku", ModelPricing { input: 0.00025, output: 0.00125 }),
        ("gemini-3.1", ModelPricing { input: 0.0015, output: 0.005 }),
        ("minimax-m2.5", ModelPricing { input: 0.001, output: 0.002 }),
        ("kimi-2.5", ModelPricing { input: 0.001, output: 0.002 }),
        ("glm-5", ModelPricing { input: 0.001, output: 0.002 }),
    ]
}

fn pricing_for(model: &str) -> ModelPricing {
    pricing_table()
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, p)| *p)
        .unwrap_or(DEFAULT_PRICING)
}

/// Estimated USD cost of a `tokens`-token exchange against `model`,
/// averaging input and output pricing the way the original does (it
/// assumes a roughly even split between prompt and completion tokens
/// rather than taking separate counts).
pub fn estimate_cost(model: &str, tokens: u64) -> f64 {
    let pricing = pricing_for(model);
    (tokens as f64 / 1000.0) * (pricing.input + pricing.output) / 2.0
}

/// Estimated cost per endpoint for a fleet of `(id, model)` pairs, at
/// `tokens` tokens each.
pub fn estimate_costs<'a, I>(endpoints: I, tokens: u64) -> HashMap<uuid::Uuid, f64>
where
    I: IntoIterator<Item = (uuid::Uuid, &'a str)>,
{
    endpoints
        .into_iter()
        .map(|(id, model)| (id, estimate_cost(model, tokens)))
        .collect()
}
