use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Task types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The kinds of work the orchestrator routes. Each has its own engine
/// priority list in [`EnginesConfig::priorities`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Reasoning,
    Code,
    Fast,
    Multimodal,
    Local,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Reasoning => "reasoning",
            TaskType::Code => "code",
            TaskType::Fast => "fast",
            TaskType::Multimodal => "multimodal",
            TaskType::Local => "local",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Engines
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnginesConfig {
    /// Per-task-type engine priority lists (first = preferred).
    /// Keys are [`TaskType`] snake_case names, values are engine names.
    #[serde(default = "d_priorities")]
    pub priorities: HashMap<String, Vec<String>>,
    /// Wall-clock bound on a single `generate` call.
    #[serde(default = "d_generate_timeout")]
    pub generate_timeout_ms: u64,
    #[serde(default)]
    pub health: HealthConfig,
}

impl Default for EnginesConfig {
    fn default() -> Self {
        Self {
            priorities: d_priorities(),
            generate_timeout_ms: d_generate_timeout(),
            health: HealthConfig::default(),
        }
    }
}

impl EnginesConfig {
    /// Priority list for a task type. Unconfigured types fall back to the
    /// `reasoning` list.
    pub fn priority_for(&self, task: TaskType) -> &[String] {
        self.priorities
            .get(task.as_str())
            .or_else(|| self.priorities.get(TaskType::Reasoning.as_str()))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Health thresholds
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Rolling sample window per engine.
    #[serde(default = "d_window")]
    pub window: usize,
    /// P50 at or below this is healthy.
    #[serde(default = "d_healthy_p50")]
    pub healthy_p50_ms: u64,
    /// Error rate at or below this is healthy.
    #[serde(default = "d_healthy_err")]
    pub healthy_error_rate: f64,
    /// P50 above this is degraded.
    #[serde(default = "d_degraded_p50")]
    pub degraded_p50_ms: u64,
    /// Error rate above this is degraded.
    #[serde(default = "d_degraded_err")]
    pub degraded_error_rate: f64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            window: d_window(),
            healthy_p50_ms: d_healthy_p50(),
            healthy_error_rate: d_healthy_err(),
            degraded_p50_ms: d_degraded_p50(),
            degraded_error_rate: d_degraded_err(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_priorities() -> HashMap<String, Vec<String>> {
    let mut map = HashMap::new();
    map.insert("reasoning".into(), Vec::new());
    map.insert("code".into(), Vec::new());
    map.insert("fast".into(), Vec::new());
    map.insert("multimodal".into(), Vec::new());
    map.insert("local".into(), Vec::new());
    map
}
fn d_generate_timeout() -> u64 {
    30_000
}
fn d_window() -> usize {
    20
}
fn d_healthy_p50() -> u64 {
    2_500
}
fn d_healthy_err() -> f64 {
    0.1
}
fn d_degraded_p50() -> u64 {
    5_000
}
fn d_degraded_err() -> f64 {
    0.3
}
