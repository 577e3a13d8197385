use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation state machine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-conversation lifecycle state. Transitions follow a fixed graph;
/// `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcpState {
    Idle,
    Requested,
    Approved,
    Executing,
    Done,
    Failed,
}

impl AcpState {
    /// States reachable from `self` in one step.
    pub fn allowed_transitions(&self) -> &'static [AcpState] {
        match self {
            AcpState::Idle => &[AcpState::Requested],
            AcpState::Requested => &[AcpState::Approved, AcpState::Failed],
            AcpState::Approved => &[AcpState::Executing, AcpState::Failed],
            AcpState::Executing => &[AcpState::Done, AcpState::Failed],
            AcpState::Done | AcpState::Failed => &[],
        }
    }

    pub fn can_transition_to(&self, next: AcpState) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AcpState::Done | AcpState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AcpState::Idle => "idle",
            AcpState::Requested => "requested",
            AcpState::Approved => "approved",
            AcpState::Executing => "executing",
            AcpState::Done => "done",
            AcpState::Failed => "failed",
        }
    }
}
