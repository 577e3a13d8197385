use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Transport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Outbound channel priority (first connected wins).
    #[serde(default)]
    pub priority: Vec<String>,
    /// Idle sessions older than this are evicted.
    #[serde(default = "d_session_idle")]
    pub session_idle_secs: u64,
    /// Rolling message window per session.
    #[serde(default = "d_session_window")]
    pub session_window: usize,
    #[serde(default)]
    pub pairing: PairingConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            priority: Vec::new(),
            session_idle_secs: d_session_idle(),
            session_window: d_session_window(),
            pairing: PairingConfig::default(),
        }
    }
}

// ── Pairing ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairingConfig {
    /// Pairing-code time to live.
    #[serde(default = "d_code_ttl")]
    pub code_ttl_secs: u64,
    /// Failed validations tolerated per client prefix per window.
    #[serde(default = "d_throttle_failures")]
    pub throttle_max_failures: u32,
    /// Failure-throttle window length.
    #[serde(default = "d_throttle_window")]
    pub throttle_window_secs: u64,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            code_ttl_secs: d_code_ttl(),
            throttle_max_failures: d_throttle_failures(),
            throttle_window_secs: d_throttle_window(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_session_idle() -> u64 {
    2 * 3_600
}
fn d_session_window() -> usize {
    40
}
fn d_code_ttl() -> u64 {
    300
}
fn d_throttle_failures() -> u32 {
    5
}
fn d_throttle_window() -> u64 {
    900
}
