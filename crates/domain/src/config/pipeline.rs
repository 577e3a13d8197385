use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Pipeline
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Canned reply returned when safety-in blocks a turn.
    #[serde(default = "d_refusal")]
    pub refusal_message: String,
    /// How many retrieved memories a turn injects at most.
    #[serde(default = "d_memory_limit")]
    pub memory_limit: usize,
    /// Fire-and-forget profile extraction after each turn.
    #[serde(default = "d_true")]
    pub profile_extraction: bool,
    #[serde(default)]
    pub critic: CriticConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            refusal_message: d_refusal(),
            memory_limit: d_memory_limit(),
            profile_extraction: d_true(),
            critic: CriticConfig::default(),
        }
    }
}

// ── Response critic ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriticConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    /// Mean score below this triggers a refinement pass.
    #[serde(default = "d_critic_threshold")]
    pub threshold: f64,
    /// Hard cap on refinement iterations.
    #[serde(default = "d_critic_iterations")]
    pub max_iterations: usize,
    /// Latency budget across all critic iterations.
    #[serde(default = "d_critic_budget")]
    pub budget_ms: u64,
}

impl Default for CriticConfig {
    fn default() -> Self {
        Self {
            enabled: d_true(),
            threshold: d_critic_threshold(),
            max_iterations: d_critic_iterations(),
            budget_ms: d_critic_budget(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Supervisor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Hard cap on DAG size (spec fixes the ceiling at 8).
    #[serde(default = "d_max_subtasks")]
    pub max_subtasks: usize,
    /// Total wall clock for one supervise run.
    #[serde(default = "d_wall_clock")]
    pub wall_clock_secs: u64,
    #[serde(default)]
    pub loop_detector: LoopDetectorConfig,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_subtasks: d_max_subtasks(),
            wall_clock_secs: d_wall_clock(),
            loop_detector: LoopDetectorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopDetectorConfig {
    /// Identical calls before a warning is attached.
    #[serde(default = "d_identical_warn")]
    pub identical_warn: usize,
    /// Identical calls before the circuit breaks.
    #[serde(default = "d_identical_break")]
    pub identical_break: usize,
    /// No-progress window length.
    #[serde(default = "d_no_progress_window")]
    pub no_progress_window_secs: u64,
    /// Calls without progress inside the window before breaking.
    #[serde(default = "d_no_progress_threshold")]
    pub no_progress_threshold: usize,
    /// Calls examined for the A→B→A→B pattern.
    #[serde(default = "d_ping_pong_window")]
    pub ping_pong_window: usize,
    /// Alternations inside that window before breaking.
    #[serde(default = "d_ping_pong_alternations")]
    pub ping_pong_alternations: usize,
}

impl Default for LoopDetectorConfig {
    fn default() -> Self {
        Self {
            identical_warn: d_identical_warn(),
            identical_break: d_identical_break(),
            no_progress_window_secs: d_no_progress_window(),
            no_progress_threshold: d_no_progress_threshold(),
            ping_pong_window: d_ping_pong_window(),
            ping_pong_alternations: d_ping_pong_alternations(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_refusal() -> String {
    "I can't help with that request.".into()
}
fn d_memory_limit() -> usize {
    6
}
fn d_true() -> bool {
    true
}
fn d_critic_threshold() -> f64 {
    0.7
}
fn d_critic_iterations() -> usize {
    2
}
fn d_critic_budget() -> u64 {
    3_000
}
fn d_max_subtasks() -> usize {
    8
}
fn d_wall_clock() -> u64 {
    120
}
fn d_identical_warn() -> usize {
    3
}
fn d_identical_break() -> usize {
    5
}
fn d_no_progress_window() -> u64 {
    30
}
fn d_no_progress_threshold() -> usize {
    5
}
fn d_ping_pong_window() -> usize {
    6
}
fn d_ping_pong_alternations() -> usize {
    3
}
