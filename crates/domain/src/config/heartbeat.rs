use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Heartbeat / proactive loop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    /// Tick interval right after user activity.
    #[serde(default = "d_active_interval")]
    pub active_interval_secs: u64,
    /// Tick interval in the steady state.
    #[serde(default = "d_normal_interval")]
    pub normal_interval_secs: u64,
    /// Tick interval when the user has been idle for a while.
    #[serde(default = "d_inactive_interval")]
    pub inactive_interval_secs: u64,
    /// Multiplier applied per consecutive skipped send.
    #[serde(default = "d_backoff_factor")]
    pub backoff_factor: f64,
    /// Interval ceiling after backoff.
    #[serde(default = "d_max_interval")]
    pub max_interval_secs: u64,
    /// Activity younger than this counts as "recent".
    #[serde(default = "d_recent_activity")]
    pub recent_activity_secs: u64,
    /// Idle longer than this switches to the inactive interval.
    #[serde(default = "d_inactive_after")]
    pub inactive_after_secs: u64,
    /// Candidates send only when VoI exceeds this.
    #[serde(default = "d_voi_threshold")]
    pub voi_threshold: f64,
    /// IANA timezone used for quiet hours and typical-hour prediction.
    #[serde(default = "d_timezone")]
    pub timezone: String,
    /// Quiet hours [start, end) in local time, wrapping midnight.
    #[serde(default = "d_quiet_start")]
    pub quiet_start_hour: u32,
    #[serde(default = "d_quiet_end")]
    pub quiet_end_hour: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: d_true(),
            active_interval_secs: d_active_interval(),
            normal_interval_secs: d_normal_interval(),
            inactive_interval_secs: d_inactive_interval(),
            backoff_factor: d_backoff_factor(),
            max_interval_secs: d_max_interval(),
            recent_activity_secs: d_recent_activity(),
            inactive_after_secs: d_inactive_after(),
            voi_threshold: d_voi_threshold(),
            timezone: d_timezone(),
            quiet_start_hour: d_quiet_start(),
            quiet_end_hour: d_quiet_end(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_true() -> bool {
    true
}
fn d_active_interval() -> u64 {
    120
}
fn d_normal_interval() -> u64 {
    600
}
fn d_inactive_interval() -> u64 {
    1_800
}
fn d_backoff_factor() -> f64 {
    1.25
}
fn d_max_interval() -> u64 {
    3_600
}
fn d_recent_activity() -> u64 {
    900
}
fn d_inactive_after() -> u64 {
    6 * 3_600
}
fn d_voi_threshold() -> f64 {
    0.3
}
fn d_timezone() -> String {
    "UTC".into()
}
fn d_quiet_start() -> u32 {
    22
}
fn d_quiet_end() -> u32 {
    8
}
