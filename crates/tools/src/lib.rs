//! Tool registry and the invocation contract.
//!
//! Every call runs guard → dual review → execute → output scan. A
//! denial at any stage becomes a stringified refusal returned as the
//! tool result; the surrounding task continues.

pub mod schema;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::Value;

use orion_domain::config::ToolsConfig;
use orion_domain::error::Result;
use orion_security::SecurityChain;

pub use schema::{FieldType, ToolSchema};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool trait & entry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    async fn invoke(&self, args: &Value) -> Result<String>;
}

/// Which argument fields the guard inspects, per surface.
#[derive(Debug, Clone, Default)]
pub struct GuardMeta {
    pub url_fields: Vec<String>,
    pub path_fields: Vec<String>,
    pub command_fields: Vec<String>,
}

impl GuardMeta {
    pub fn urls(fields: &[&str]) -> Self {
        Self {
            url_fields: fields.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn paths(fields: &[&str]) -> Self {
        Self {
            path_fields: fields.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn commands(fields: &[&str]) -> Self {
        Self {
            command_fields: fields.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }
}

pub struct ToolEntry {
    pub name: String,
    pub description: String,
    pub schema: ToolSchema,
    pub guard: GuardMeta,
    handler: Arc<dyn Tool>,
}

/// The stringified result handed back to the caller. Denials are
/// results, not errors at the task level.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutcome {
    fn refusal(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ToolRegistry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<ToolEntry>>>,
    invoke_timeout: Duration,
}

impl ToolRegistry {
    pub fn new(cfg: &ToolsConfig) -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            invoke_timeout: Duration::from_secs(cfg.invoke_timeout_secs),
        }
    }

    /// Register a tool. Startup-time for builtins; discovered tools
    /// (e.g. MCP) register into the same map later.
    pub fn register(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        schema: ToolSchema,
        guard: GuardMeta,
        handler: Arc<dyn Tool>,
    ) {
        let name = name.into();
        tracing::info!(tool = %name, "registered tool");
        self.tools.write().insert(
            name.clone(),
            Arc::new(ToolEntry {
                name,
                description: description.into(),
                schema,
                guard,
                handler,
            }),
        );
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// One-line-per-tool index for the system prompt.
    pub fn render_index(&self) -> String {
        let tools = self.tools.read();
        let mut lines: Vec<String> = tools
            .values()
            .map(|t| format!("- {}: {}", t.name, t.description))
            .collect();
        lines.sort();
        lines.join("\n")
    }

    // ── Invocation contract ────────────────────────────────────────

    /// guard → review → execute → scan.
    pub async fn invoke(
        &self,
        name: &str,
        args: &Value,
        security: &SecurityChain,
    ) -> ToolOutcome {
        let Some(entry) = self.tools.read().get(name).cloned() else {
            return ToolOutcome::refusal(format!("unknown tool '{name}'"));
        };

        // Schema check before anything touches the arguments.
        if let Err(reason) = entry.schema.validate(args) {
            return ToolOutcome::refusal(format!("invalid arguments for '{name}': {reason}"));
        }

        // Deterministic guard over the declared surfaces.
        if let Some(reason) = guard_check(&entry.guard, args, security) {
            tracing::warn!(tool = %name, reason = %reason, "tool call denied by guard");
            return ToolOutcome::refusal(format!("tool call denied: {reason}"));
        }

        // Dual-agent review.
        let verdict = security.review.review(name, args).await;
        if !verdict.approved {
            tracing::warn!(tool = %name, reason = %verdict.reason, "tool call denied by review");
            return ToolOutcome::refusal(format!("tool call denied: {}", verdict.reason));
        }

        // Execute under the timeout.
        let result = match tokio::time::timeout(self.invoke_timeout, entry.handler.invoke(args)).await
        {
            Ok(Ok(content)) => content,
            Ok(Err(e)) => {
                return ToolOutcome::refusal(format!("tool '{name}' failed: {e}"));
            }
            Err(_) => {
                return ToolOutcome::refusal(format!(
                    "tool '{name}' timed out after {}s",
                    self.invoke_timeout.as_secs()
                ));
            }
        };

        // Outbound scan of the tool result.
        let scanned = security.scanner.scan(&result);
        ToolOutcome {
            content: scanned.sanitized,
            is_error: false,
        }
    }
}

/// Run the guard over each declared field. Returns the first denial.
fn guard_check(meta: &GuardMeta, args: &Value, security: &SecurityChain) -> Option<String> {
    for field in &meta.url_fields {
        if let Some(url) = args.get(field).and_then(|v| v.as_str()) {
            let verdict = security.guard.check_url(url);
            if !verdict.allowed {
                return verdict.reason;
            }
        }
    }
    for field in &meta.path_fields {
        if let Some(path) = args.get(field).and_then(|v| v.as_str()) {
            let verdict = security.guard.check_path(path);
            if !verdict.allowed {
                return verdict.reason;
            }
        }
    }
    for field in &meta.command_fields {
        if let Some(command) = args.get(field).and_then(|v| v.as_str()) {
            let verdict = security.guard.check_command(command);
            if !verdict.allowed {
                return verdict.reason;
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use orion_domain::config::{EnginesConfig, SecurityConfig};
    use orion_engines::testing::ScriptedEngine;
    use orion_engines::{EngineRegistry, Orchestrator};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTool {
        calls: AtomicUsize,
        response: String,
    }

    #[async_trait::async_trait]
    impl Tool for CountingTool {
        async fn invoke(&self, _args: &Value) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    fn security() -> SecurityChain {
        // A reviewer that approves everything at low risk.
        let engine =
            ScriptedEngine::new("fast").always(r#"{"approved": true, "risk_level": "low"}"#);
        let mut cfg = EnginesConfig::default();
        cfg.priorities.insert("fast".into(), vec!["fast".into()]);
        let orch = Arc::new(Orchestrator::new(
            EngineRegistry::from_engines(vec![Arc::new(engine)]),
            cfg,
        ));
        SecurityChain::new(&SecurityConfig::default(), orch)
    }

    fn registry_with(tool: Arc<CountingTool>, guard: GuardMeta) -> ToolRegistry {
        let registry = ToolRegistry::new(&ToolsConfig::default());
        registry.register(
            "fetch",
            "fetch a URL",
            ToolSchema::new().field("url", FieldType::String, true, "target"),
            guard,
            tool,
        );
        registry
    }

    #[tokio::test]
    async fn happy_path_executes_and_scans() {
        let tool = Arc::new(CountingTool {
            calls: AtomicUsize::new(0),
            response: "body with sk-abcdefghijklmnopqrstuv12 inside".into(),
        });
        let registry = registry_with(tool.clone(), GuardMeta::urls(&["url"]));
        let sec = security();

        let outcome = registry
            .invoke("fetch", &json!({"url": "https://example.com"}), &sec)
            .await;
        assert!(!outcome.is_error);
        assert_eq!(tool.calls.load(Ordering::SeqCst), 1);
        assert!(outcome.content.contains("[REDACTED]"), "tool output must be scanned");
    }

    #[tokio::test]
    async fn private_url_is_denied_without_execution() {
        let tool = Arc::new(CountingTool {
            calls: AtomicUsize::new(0),
            response: "unreachable".into(),
        });
        let registry = registry_with(tool.clone(), GuardMeta::urls(&["url"]));
        let sec = security();

        let outcome = registry
            .invoke("fetch", &json!({"url": "http://169.254.169.254/meta"}), &sec)
            .await;
        assert!(outcome.is_error);
        assert!(outcome.content.contains("denied"));
        assert_eq!(tool.calls.load(Ordering::SeqCst), 0, "guard must pre-empt the call");
    }

    #[tokio::test]
    async fn schema_violation_is_a_refusal() {
        let tool = Arc::new(CountingTool {
            calls: AtomicUsize::new(0),
            response: "x".into(),
        });
        let registry = registry_with(tool.clone(), GuardMeta::default());
        let sec = security();

        let outcome = registry.invoke("fetch", &json!({"nope": 1}), &sec).await;
        assert!(outcome.is_error);
        assert_eq!(tool.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_tool_is_a_refusal() {
        let registry = ToolRegistry::new(&ToolsConfig::default());
        let sec = security();
        let outcome = registry.invoke("missing", &json!({}), &sec).await;
        assert!(outcome.is_error);
        assert!(outcome.content.contains("unknown tool"));
    }
}
