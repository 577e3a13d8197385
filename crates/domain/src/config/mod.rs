mod engines;
mod heartbeat;
mod memory;
mod pipeline;
mod security;
mod server;
mod transport;
mod usage;
mod workspace;

pub use engines::*;
pub use heartbeat::*;
pub use memory::*;
pub use pipeline::*;
pub use security::*;
pub use server::*;
pub use transport::*;
pub use usage::*;
pub use workspace::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engines: EnginesConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub usage: UsageConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub acp: AcpConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ACP
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcpConfig {
    /// Wall-clock bound for a single agent handler invocation.
    #[serde(default = "d_acp_timeout")]
    pub handler_timeout_secs: u64,
}

impl Default for AcpConfig {
    fn default() -> Self {
        Self {
            handler_timeout_secs: d_acp_timeout(),
        }
    }
}

fn d_acp_timeout() -> u64 {
    30
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tools
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Default per-invocation timeout.
    #[serde(default = "d_tool_timeout")]
    pub invoke_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            invoke_timeout_secs: d_tool_timeout(),
        }
    }
}

fn d_tool_timeout() -> u64 {
    30
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate cross-field constraints. Errors are fatal at startup;
    /// warnings are logged and the host continues.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.memory.vector_dim == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "memory.vector_dim".into(),
                message: "vector dimension must be non-zero".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.memory.alpha) || self.memory.alpha < 0.01 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "memory.alpha".into(),
                message: "learning rate must be in [0.01, 1.0]".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.memory.gamma) {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "memory.gamma".into(),
                message: "discount factor must be in [0.0, 1.0]".into(),
            });
        }
        if self.supervisor.max_subtasks > 8 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "supervisor.max_subtasks".into(),
                message: "values above 8 are clamped at plan time".into(),
            });
        }
        if self.server.host != "127.0.0.1" && self.server.host != "localhost" {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "server.host".into(),
                message: "gateway is designed for loopback binds only".into(),
            });
        }
        if self.heartbeat.voi_threshold <= 0.0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "heartbeat.voi_threshold".into(),
                message: "non-positive threshold sends every candidate".into(),
            });
        }

        issues
    }
}
