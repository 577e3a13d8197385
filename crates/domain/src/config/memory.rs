use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Memory
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Embedding dimension. Fixed per deployment; mixed-dimension vectors
    /// are rejected by the ANN index.
    #[serde(default = "d_vector_dim")]
    pub vector_dim: usize,
    /// Phase-1 similarity threshold τ.
    #[serde(default = "d_similarity_threshold")]
    pub similarity_threshold: f32,
    /// Phase-1 fetches `candidate_multiplier · k` candidates.
    #[serde(default = "d_candidate_multiplier")]
    pub candidate_multiplier: usize,
    /// Blended rerank weights.
    #[serde(default)]
    pub weights: RerankWeights,
    /// MemRL learning rate α ∈ [0.01, 1].
    #[serde(default = "d_alpha")]
    pub alpha: f64,
    /// MemRL discount factor γ ∈ [0, 1].
    #[serde(default = "d_gamma")]
    pub gamma: f64,
    /// Lower clamp for utility and Q-value.
    #[serde(default = "d_score_min")]
    pub score_min: f64,
    /// Upper clamp for utility and Q-value.
    #[serde(default = "d_score_max")]
    pub score_max: f64,
    /// Level-0 node count that triggers compression.
    #[serde(default = "d_compress_threshold")]
    pub compress_threshold: usize,
    /// How many of the oldest level-0 nodes one compression folds.
    #[serde(default = "d_compress_batch")]
    pub compress_batch: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            vector_dim: d_vector_dim(),
            similarity_threshold: d_similarity_threshold(),
            candidate_multiplier: d_candidate_multiplier(),
            weights: RerankWeights::default(),
            alpha: d_alpha(),
            gamma: d_gamma(),
            score_min: d_score_min(),
            score_max: d_score_max(),
            compress_threshold: d_compress_threshold(),
            compress_batch: d_compress_batch(),
        }
    }
}

/// Weights of the phase-2 blended score
/// `w.similarity·sim + w.q_value·Q + w.utility·U`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankWeights {
    #[serde(default = "d_w_sim")]
    pub similarity: f64,
    #[serde(default = "d_w_q")]
    pub q_value: f64,
    #[serde(default = "d_w_util")]
    pub utility: f64,
}

impl Default for RerankWeights {
    fn default() -> Self {
        Self {
            similarity: d_w_sim(),
            q_value: d_w_q(),
            utility: d_w_util(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_vector_dim() -> usize {
    384
}
fn d_similarity_threshold() -> f32 {
    0.3
}
fn d_candidate_multiplier() -> usize {
    3
}
fn d_alpha() -> f64 {
    0.3
}
fn d_gamma() -> f64 {
    0.9
}
fn d_score_min() -> f64 {
    0.05
}
fn d_score_max() -> f64 {
    0.99
}
fn d_compress_threshold() -> usize {
    50
}
fn d_compress_batch() -> usize {
    20
}
fn d_w_sim() -> f64 {
    0.5
}
fn d_w_q() -> f64 {
    0.3
}
fn d_w_util() -> f64 {
    0.2
}
