use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Security
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecurityConfig {
    #[serde(default)]
    pub affordance: AffordanceConfig,
    #[serde(default)]
    pub guard: GuardConfig,
    #[serde(default)]
    pub review: ReviewConfig,
}

// ── Affordance check ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffordanceConfig {
    /// Risk score at or above this blocks the input.
    #[serde(default = "d_block_threshold")]
    pub block_threshold: f64,
    /// Wall-clock bound on the LLM deep check; timeout defaults to safe.
    #[serde(default = "d_deep_check_timeout")]
    pub deep_check_timeout_ms: u64,
}

impl Default for AffordanceConfig {
    fn default() -> Self {
        Self {
            block_threshold: d_block_threshold(),
            deep_check_timeout_ms: d_deep_check_timeout(),
        }
    }
}

// ── Tool guard ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Path prefixes a tool may never touch.
    #[serde(default = "d_protected_prefixes")]
    pub protected_prefixes: Vec<String>,
    /// Basenames that are sensitive wherever they live.
    #[serde(default = "d_sensitive_basenames")]
    pub sensitive_basenames: Vec<String>,
    /// Maximum `..` segments tolerated in a relative path.
    #[serde(default = "d_max_traversal")]
    pub max_traversal_depth: usize,
    /// Denied command patterns (regex, matched against the whole line).
    #[serde(default = "d_denied_commands")]
    pub denied_commands: Vec<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            protected_prefixes: d_protected_prefixes(),
            sensitive_basenames: d_sensitive_basenames(),
            max_traversal_depth: d_max_traversal(),
            denied_commands: d_denied_commands(),
        }
    }
}

// ── Dual-agent review ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Wall-clock bound on the evaluator call.
    #[serde(default = "d_review_timeout")]
    pub timeout_ms: u64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            timeout_ms: d_review_timeout(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_block_threshold() -> f64 {
    0.85
}
fn d_deep_check_timeout() -> u64 {
    1_900
}
fn d_review_timeout() -> u64 {
    1_900
}
fn d_max_traversal() -> usize {
    2
}
fn d_protected_prefixes() -> Vec<String> {
    vec![
        "/etc".into(),
        "/sys".into(),
        "/proc".into(),
        "/boot".into(),
        "/root/.ssh".into(),
        "/var/run".into(),
    ]
}
fn d_sensitive_basenames() -> Vec<String> {
    vec![
        ".env".into(),
        "id_rsa".into(),
        "id_ed25519".into(),
        "credentials".into(),
        "shadow".into(),
        "passwd".into(),
        ".netrc".into(),
        ".npmrc".into(),
    ]
}
fn d_denied_commands() -> Vec<String> {
    vec![
        r"^\s*rm\s+(-[a-zA-Z]*r[a-zA-Z]*f|-[a-zA-Z]*f[a-zA-Z]*r)\b".into(),
        r"\bmkfs(\.\w+)?\b".into(),
        r"\bdd\s+.*\bof=/dev/".into(),
        r":\(\)\s*\{.*\};\s*:".into(),
        r"\bshutdown\b|\breboot\b|\bhalt\b".into(),
        r"\bchmod\s+777\s+/\s*$".into(),
        r"curl[^|]*\|\s*(ba)?sh".into(),
        r"wget[^|]*\|\s*(ba)?sh".into(),
        r"\bbase64\b.*\|\s*(ba)?sh".into(),
    ]
}
