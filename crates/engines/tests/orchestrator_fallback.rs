//! Integration tests for health-driven routing — full round-trip
//! without any external provider. All tests are pure and deterministic.

use std::sync::Arc;

use orion_domain::config::{EnginesConfig, TaskType};
use orion_engines::testing::ScriptedEngine;
use orion_engines::{Engine, EngineRegistry, GenerateRequest, Orchestrator};

fn cfg(reasoning: &[&str]) -> EnginesConfig {
    let mut cfg = EnginesConfig::default();
    cfg.priorities.insert(
        "reasoning".into(),
        reasoning.iter().map(|s| s.to_string()).collect(),
    );
    cfg
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Fallback on sustained failure
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn failing_primary_falls_back_until_recovery() {
    let primary = Arc::new(ScriptedEngine::new("primary").failing());
    let backup = Arc::new(ScriptedEngine::new("backup").always("from backup"));
    let engines: Vec<Arc<dyn Engine>> = vec![primary.clone(), backup.clone()];
    let orch = Orchestrator::new(
        EngineRegistry::from_engines(engines),
        cfg(&["primary", "backup"]),
    );

    // Fill the primary's 20-sample window with a 50% error rate.
    for i in 0..20 {
        orch.record("primary", 100, i % 2 == 0);
    }
    assert_eq!(
        orch.status_of("primary"),
        orion_engines::EngineStatus::Degraded
    );

    // Subsequent routing prefers the backup.
    for _ in 0..3 {
        let out = orch
            .generate(TaskType::Reasoning, GenerateRequest::prompt("q"))
            .await
            .unwrap();
        assert_eq!(out, "from backup");
    }
    assert_eq!(primary.call_count(), 0);
    assert_eq!(backup.call_count(), 3);

    // Recovery: both thresholds hold across the whole window again.
    for _ in 0..20 {
        orch.record("primary", 100, true);
    }
    assert_eq!(
        orch.status_of("primary"),
        orion_engines::EngineStatus::Healthy
    );
    let routed = orch.route(TaskType::Reasoning).unwrap();
    assert_eq!(routed.name(), "primary");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Probe behaviour
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn probe_skips_unavailable_engines() {
    let up = ScriptedEngine::new("up").into_arc();
    let down = ScriptedEngine::new("down").unavailable().into_arc();
    let registry = EngineRegistry::probe(vec![up, down]).await;

    assert_eq!(registry.names(), vec!["up".to_string()]);
    assert_eq!(registry.probe_failures(), &["down".to_string()]);
}

#[tokio::test]
async fn generation_failures_feed_the_health_window() {
    let flaky = ScriptedEngine::new("flaky").failing().into_arc();
    let orch = Orchestrator::new(EngineRegistry::from_engines(vec![flaky]), cfg(&["flaky"]));

    for _ in 0..20 {
        let out = orch
            .generate(TaskType::Reasoning, GenerateRequest::prompt("q"))
            .await
            .unwrap();
        assert!(out.is_empty(), "failed engine must surface empty output");
    }

    let snap = &orch.snapshot()[0];
    assert_eq!(snap.health.samples, 20);
    assert_eq!(snap.health.error_rate, 1.0);
    assert_eq!(snap.health.status, orion_engines::EngineStatus::Degraded);
}
