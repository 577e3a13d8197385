//! Dual-agent review — a second opinion on every tool call that passed
//! the deterministic guard.
//!
//! Known high-risk terminal patterns are pre-rejected without spending
//! an evaluator call. Otherwise an evaluator LLM returns `{approved,
//! reason, risk_level}`; on evaluator failure or timeout we fall back
//! to keyword heuristics.

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use orion_domain::config::{ReviewConfig, TaskType};
use orion_engines::{GenerateRequest, Orchestrator};

use crate::affordance::extract_json;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Verdict
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone)]
pub struct ReviewVerdict {
    pub approved: bool,
    pub reason: String,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Deserialize)]
struct EvaluatorReply {
    approved: bool,
    #[serde(default)]
    reason: Option<String>,
    risk_level: RiskLevel,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DualReview
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct DualReview {
    cfg: ReviewConfig,
    orchestrator: Arc<Orchestrator>,
    pre_reject: Vec<Regex>,
    risky_keywords: Regex,
}

impl DualReview {
    pub fn new(cfg: ReviewConfig, orchestrator: Arc<Orchestrator>) -> Self {
        let pre_reject = [
            r"(?i)\brm\s+-[a-z]*r[a-z]*f?\s+(/|~|\$HOME)\s*$",
            r"(?i)\bcurl\b[^|]*\|\s*(ba|z)?sh",
            r"(?i)\b(chown|chmod)\b.*\s-R?\s*.*\s/(\s|$)",
            r"(?i)>\s*/dev/sd[a-z]",
            r"(?i)\bhistory\s+-c\b",
        ]
        .iter()
        .map(|src| Regex::new(src).unwrap_or_else(|e| panic!("invalid builtin pattern: {e}")))
        .collect();

        let risky_keywords = Regex::new(
            r"(?i)\b(delete|remove|drop|truncate|sudo|password|credential|wipe|format|kill)\b",
        )
        .unwrap_or_else(|e| panic!("invalid builtin pattern: {e}"));

        Self {
            cfg,
            orchestrator,
            pre_reject,
            risky_keywords,
        }
    }

    /// Review one tool call. High risk blocks; medium is allowed with a
    /// log line; low is allowed silently.
    pub async fn review(&self, tool: &str, args: &serde_json::Value) -> ReviewVerdict {
        let rendered_args = serde_json::to_string(args).unwrap_or_default();

        for pattern in &self.pre_reject {
            if pattern.is_match(&rendered_args) {
                return ReviewVerdict {
                    approved: false,
                    reason: "matched a known high-risk pattern".into(),
                    risk_level: RiskLevel::High,
                };
            }
        }

        let deadline = Duration::from_millis(self.cfg.timeout_ms);
        let verdict = match tokio::time::timeout(deadline, self.evaluate(tool, &rendered_args)).await
        {
            Ok(Some(v)) => v,
            Ok(None) | Err(_) => self.heuristic_verdict(&rendered_args),
        };

        match verdict.risk_level {
            RiskLevel::High => ReviewVerdict {
                approved: false,
                ..verdict
            },
            RiskLevel::Medium => {
                tracing::warn!(
                    tool = %tool,
                    reason = %verdict.reason,
                    "medium-risk tool call allowed"
                );
                ReviewVerdict {
                    approved: true,
                    ..verdict
                }
            }
            RiskLevel::Low => ReviewVerdict {
                approved: true,
                ..verdict
            },
        }
    }

    async fn evaluate(&self, tool: &str, rendered_args: &str) -> Option<ReviewVerdict> {
        let prompt = format!(
            "You review tool calls issued by an assistant. Assess this call.\n\
             Reply with JSON only: {{\"approved\": <bool>, \"reason\": \"<why>\", \
             \"risk_level\": \"low\"|\"medium\"|\"high\"}}\n\n\
             Tool: {tool}\nArguments: {rendered_args}"
        );
        let reply = self
            .orchestrator
            .generate(TaskType::Fast, GenerateRequest::prompt(prompt))
            .await
            .ok()?;
        if reply.is_empty() {
            return None;
        }
        let parsed: EvaluatorReply = serde_json::from_str(extract_json(&reply)).ok()?;
        Some(ReviewVerdict {
            approved: parsed.approved,
            reason: parsed.reason.unwrap_or_else(|| "evaluator verdict".into()),
            risk_level: parsed.risk_level,
        })
    }

    /// Keyword fallback when the evaluator is unavailable.
    fn heuristic_verdict(&self, rendered_args: &str) -> ReviewVerdict {
        if self.risky_keywords.is_match(rendered_args) {
            ReviewVerdict {
                approved: true,
                reason: "evaluator unavailable; risky keywords present".into(),
                risk_level: RiskLevel::Medium,
            }
        } else {
            ReviewVerdict {
                approved: true,
                reason: "evaluator unavailable; no risk markers".into(),
                risk_level: RiskLevel::Low,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orion_domain::config::EnginesConfig;
    use orion_engines::testing::ScriptedEngine;
    use orion_engines::{Engine, EngineRegistry};

    fn review_with(engine: ScriptedEngine) -> DualReview {
        let mut cfg = EnginesConfig::default();
        cfg.priorities
            .insert("fast".into(), vec![engine.name().to_string()]);
        let orch = Arc::new(Orchestrator::new(
            EngineRegistry::from_engines(vec![Arc::new(engine)]),
            cfg,
        ));
        DualReview::new(ReviewConfig::default(), orch)
    }

    #[tokio::test]
    async fn pre_reject_skips_evaluator() {
        let engine = ScriptedEngine::new("fast")
            .always(r#"{"approved": true, "risk_level": "low"}"#);
        let review = review_with(engine);
        let v = review
            .review("terminal", &serde_json::json!({"command": "rm -rf /"}))
            .await;
        assert!(!v.approved);
        assert_eq!(v.risk_level, RiskLevel::High);
    }

    #[tokio::test]
    async fn high_risk_evaluator_verdict_blocks() {
        let engine = ScriptedEngine::new("fast")
            .always(r#"{"approved": true, "reason": "looks bad", "risk_level": "high"}"#);
        let review = review_with(engine);
        let v = review
            .review("http", &serde_json::json!({"url": "https://example.com"}))
            .await;
        assert!(!v.approved, "high always blocks, even if evaluator approved");
    }

    #[tokio::test]
    async fn medium_risk_is_allowed() {
        let engine = ScriptedEngine::new("fast")
            .always(r#"{"approved": true, "reason": "writes a file", "risk_level": "medium"}"#);
        let review = review_with(engine);
        let v = review
            .review("file_write", &serde_json::json!({"path": "./notes.md"}))
            .await;
        assert!(v.approved);
        assert_eq!(v.risk_level, RiskLevel::Medium);
    }

    #[tokio::test]
    async fn evaluator_failure_falls_back_to_heuristics() {
        let engine = ScriptedEngine::new("fast").failing();
        let review = review_with(engine);

        let benign = review
            .review("weather", &serde_json::json!({"city": "Lisbon"}))
            .await;
        assert!(benign.approved);
        assert_eq!(benign.risk_level, RiskLevel::Low);

        let risky = review
            .review("terminal", &serde_json::json!({"command": "sudo systemctl kill app"}))
            .await;
        assert!(risky.approved);
        assert_eq!(risky.risk_level, RiskLevel::Medium);
    }

    #[tokio::test]
    async fn slow_evaluator_times_out_to_heuristics() {
        let engine = ScriptedEngine::new("fast")
            .always(r#"{"approved": false, "risk_level": "high"}"#)
            .with_latency_ms(2_500);
        let review = review_with(engine);
        let v = review
            .review("weather", &serde_json::json!({"city": "Lisbon"}))
            .await;
        assert!(v.approved, "timeout must fall back to heuristics, not block");
    }
}
