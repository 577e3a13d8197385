use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Usage / telemetry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageConfig {
    /// Ring-buffer capacity before a forced flush.
    #[serde(default = "d_buffer_capacity")]
    pub buffer_capacity: usize,
    /// Periodic flush interval.
    #[serde(default = "d_flush_interval")]
    pub flush_interval_secs: u64,
    /// Pricing per million tokens keyed by `"provider/model"`;
    /// `"provider/*"` is the per-provider wildcard fallback.
    #[serde(default)]
    pub pricing: HashMap<String, ModelPricing>,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: d_buffer_capacity(),
            flush_interval_secs: d_flush_interval(),
            pricing: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelPricing {
    /// USD per million input tokens.
    pub input_per_mtok: f64,
    /// USD per million output tokens.
    pub output_per_mtok: f64,
}

impl ModelPricing {
    pub fn estimate_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1_000_000.0) * self.input_per_mtok
            + (output_tokens as f64 / 1_000_000.0) * self.output_per_mtok
    }
}

impl UsageConfig {
    /// Resolve pricing for `(provider, model)` with wildcard fallback.
    pub fn pricing_for(&self, provider: &str, model: &str) -> Option<&ModelPricing> {
        self.pricing
            .get(&format!("{provider}/{model}"))
            .or_else(|| self.pricing.get(&format!("{provider}/*")))
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_buffer_capacity() -> usize {
    1_000
}
fn d_flush_interval() -> u64 {
    5
}
