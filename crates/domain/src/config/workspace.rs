use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Workspace / context
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Directory holding the bootstrap file set and notes.
    #[serde(default = "d_root")]
    pub root: String,
    /// Per-file character cap before the truncation marker.
    #[serde(default = "d_per_file_max")]
    pub per_file_max_chars: usize,
    /// Character budget for the assembled system prompt.
    #[serde(default = "d_total_max")]
    pub total_max_chars: usize,
    /// Subdirectory (under root) for daily notes.
    #[serde(default = "d_notes_dir")]
    pub notes_dir: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: d_root(),
            per_file_max_chars: d_per_file_max(),
            total_max_chars: d_total_max(),
            notes_dir: d_notes_dir(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_root() -> String {
    "./workspace".into()
}
fn d_per_file_max() -> usize {
    12_000
}
fn d_total_max() -> usize {
    24_000
}
fn d_notes_dir() -> String {
    "notes".into()
}
