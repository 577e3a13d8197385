//! Response critic: score the draft, refine below threshold.
//!
//! Bounded by a latency budget across all iterations and a hard
//! iteration cap. Skipped entirely when only one engine is configured
//! (the refinement engine would be the one that wrote the draft).

use std::time::Instant;

use serde::Deserialize;

use orion_domain::config::{CriticConfig, TaskType};
use orion_engines::{GenerateRequest, Orchestrator};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
struct CritiqueReply {
    accuracy: f64,
    helpfulness: f64,
    completeness: f64,
}

#[derive(Debug, Clone)]
pub struct CriticOutcome {
    pub text: String,
    /// Mean critique score of the final text (1.0 when skipped).
    pub score: f64,
    pub iterations: usize,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Critic
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run the critique/refine loop over a draft reply.
pub async fn refine(
    orchestrator: &Orchestrator,
    cfg: &CriticConfig,
    user_prompt: &str,
    draft: &str,
) -> CriticOutcome {
    if !cfg.enabled || orchestrator.engine_count() < 2 {
        return CriticOutcome {
            text: draft.to_string(),
            score: 1.0,
            iterations: 0,
        };
    }

    let budget = std::time::Duration::from_millis(cfg.budget_ms);
    let started = Instant::now();
    let mut current = draft.to_string();
    let mut score = 1.0;
    let mut iterations = 0;

    while iterations < cfg.max_iterations {
        let remaining = budget.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            break;
        }

        let Some(critique) = critique(orchestrator, user_prompt, &current, remaining).await else {
            // Neutral critique on evaluator failure: accept the draft.
            break;
        };
        score = critique;
        if score >= cfg.threshold {
            break;
        }

        let remaining = budget.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            break;
        }
        iterations += 1;

        let prompt = format!(
            "Your previous reply scored below the quality bar. Improve it.\n\n\
             Question:\n{user_prompt}\n\nPrevious reply:\n{current}\n\n\
             Reply with the improved answer only."
        );
        let refined = tokio::time::timeout(
            remaining,
            orchestrator.generate(TaskType::Reasoning, GenerateRequest::prompt(prompt)),
        )
        .await;
        match refined {
            Ok(Ok(text)) if !text.is_empty() => current = text,
            _ => break,
        }
    }

    CriticOutcome {
        text: current,
        score,
        iterations,
    }
}

async fn critique(
    orchestrator: &Orchestrator,
    user_prompt: &str,
    draft: &str,
    remaining: std::time::Duration,
) -> Option<f64> {
    let prompt = format!(
        "Score this assistant reply against the question.\n\
         Reply with JSON only: {{\"accuracy\": <0..1>, \"helpfulness\": <0..1>, \
         \"completeness\": <0..1>}}\n\nQuestion:\n{user_prompt}\n\nReply:\n{draft}"
    );
    let reply = tokio::time::timeout(
        remaining,
        orchestrator.generate(TaskType::Fast, GenerateRequest::prompt(prompt)),
    )
    .await
    .ok()?
    .ok()?;
    if reply.is_empty() {
        return None;
    }

    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    let parsed: CritiqueReply = serde_json::from_str(&reply[start..=end]).ok()?;
    Some(
        ((parsed.accuracy + parsed.helpfulness + parsed.completeness) / 3.0).clamp(0.0, 1.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use orion_domain::config::EnginesConfig;
    use orion_engines::testing::ScriptedEngine;
    use orion_engines::{Engine, EngineRegistry};
    use std::sync::Arc;

    fn orchestrator_with(
        reasoning: ScriptedEngine,
        fast: ScriptedEngine,
    ) -> Orchestrator {
        let mut cfg = EnginesConfig::default();
        cfg.priorities
            .insert("reasoning".into(), vec![reasoning.name().to_string()]);
        cfg.priorities
            .insert("fast".into(), vec![fast.name().to_string()]);
        Orchestrator::new(
            EngineRegistry::from_engines(vec![Arc::new(reasoning), Arc::new(fast)]),
            cfg,
        )
    }

    #[tokio::test]
    async fn good_draft_passes_first_critique() {
        let orch = orchestrator_with(
            ScriptedEngine::new("reasoning").always("unused refinement"),
            ScriptedEngine::new("fast")
                .always(r#"{"accuracy": 0.9, "helpfulness": 0.9, "completeness": 0.9}"#),
        );
        let outcome = refine(&orch, &CriticConfig::default(), "q", "a solid draft").await;
        assert_eq!(outcome.text, "a solid draft");
        assert_eq!(outcome.iterations, 0);
        assert!(outcome.score > 0.7);
    }

    #[tokio::test]
    async fn weak_draft_is_refined_once() {
        let orch = orchestrator_with(
            ScriptedEngine::new("reasoning").always("much better answer"),
            ScriptedEngine::new("fast")
                .then(r#"{"accuracy": 0.3, "helpfulness": 0.3, "completeness": 0.3}"#)
                .always(r#"{"accuracy": 0.9, "helpfulness": 0.9, "completeness": 0.9}"#),
        );
        let outcome = refine(&orch, &CriticConfig::default(), "q", "weak").await;
        assert_eq!(outcome.text, "much better answer");
        assert_eq!(outcome.iterations, 1);
    }

    #[tokio::test]
    async fn iteration_cap_holds() {
        // Critic never satisfied; refinement always "improves".
        let orch = orchestrator_with(
            ScriptedEngine::new("reasoning").always("still weak"),
            ScriptedEngine::new("fast")
                .always(r#"{"accuracy": 0.1, "helpfulness": 0.1, "completeness": 0.1}"#),
        );
        let cfg = CriticConfig::default();
        let outcome = refine(&orch, &cfg, "q", "draft").await;
        assert!(outcome.iterations <= cfg.max_iterations);
    }

    #[tokio::test]
    async fn single_engine_skips_critic() {
        let mut cfg = EnginesConfig::default();
        cfg.priorities.insert("reasoning".into(), vec!["only".into()]);
        let orch = Orchestrator::new(
            EngineRegistry::from_engines(vec![Arc::new(
                ScriptedEngine::new("only").always("x"),
            )]),
            cfg,
        );
        let outcome = refine(&orch, &CriticConfig::default(), "q", "draft").await;
        assert_eq!(outcome.iterations, 0);
        assert_eq!(outcome.text, "draft");
    }

    #[tokio::test]
    async fn evaluator_failure_accepts_draft() {
        let orch = orchestrator_with(
            ScriptedEngine::new("reasoning").always("unused"),
            ScriptedEngine::new("fast").failing(),
        );
        let outcome = refine(&orch, &CriticConfig::default(), "q", "the draft").await;
        assert_eq!(outcome.text, "the draft");
    }
}
