//! Supervisor wave execution against a scripted planner.

use std::sync::Arc;

use orion_domain::config::Config;
use orion_engines::testing::ScriptedEngine;
use orion_engines::Engine;
use orion_gateway::runtime::supervise;
use orion_gateway::state::HostContext;
use orion_store::InMemoryStore;

const PLAN: &str = r#"[
  {"id": "a", "task": "research library A", "dependsOn": []},
  {"id": "b", "task": "research library B", "dependsOn": []},
  {"id": "c", "task": "compare both libraries", "dependsOn": ["a", "b"]}
]"#;

fn test_config(workspace: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.workspace.root = workspace.to_string_lossy().into_owned();
    config.memory.similarity_threshold = 0.0;
    config.pipeline.profile_extraction = false;
    config
}

async fn host_with(engines: Vec<Arc<dyn Engine>>) -> (HostContext, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let ctx = HostContext::build(
        test_config(dir.path()),
        engines,
        Vec::new(),
        Arc::new(InMemoryStore::new()),
    )
    .await
    .unwrap();
    (ctx, dir)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wave scheduling
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn waves_run_in_order_and_context_flows_downstream() {
    // Call order: plan, (a, b in either order), c, synthesis.
    let reasoning = Arc::new(
        ScriptedEngine::new("reasoning")
            .then(PLAN)
            .then("research-result-one")
            .then("research-result-two")
            .then("comparison-of-both")
            .then("final synthesis"),
    );
    let (ctx, _dir) = host_with(vec![reasoning.clone()]).await;

    let reply = supervise(&ctx, "alice", "test", "Compare two libraries and summarize", 8).await;
    assert_eq!(reply, "final synthesis");

    let prompts = reasoning.prompts();
    assert_eq!(prompts.len(), 5);
    assert!(prompts[0].contains("Decompose"), "first call is the planner");

    // Wave 1: a and b, in either order, without upstream context.
    for prompt in &prompts[1..3] {
        assert!(prompt.contains("research library"));
        assert!(!prompt.contains("Context from completed subtasks"));
    }

    // Wave 2: c sees both wave-1 outputs.
    assert!(prompts[3].contains("compare both libraries"));
    assert!(prompts[3].contains("research-result-one"));
    assert!(prompts[3].contains("research-result-two"));

    // Synthesis sees every node output.
    assert!(prompts[4].contains("comparison-of-both"));
}

#[tokio::test]
async fn unparseable_plan_falls_back_to_single_node() {
    let reasoning = Arc::new(
        ScriptedEngine::new("reasoning")
            .then("I would rather write prose than JSON")
            .then("direct answer")
            .then("synthesized answer"),
    );
    let (ctx, _dir) = host_with(vec![reasoning.clone()]).await;

    let reply = supervise(&ctx, "alice", "test", "just do the thing", 8).await;
    assert_eq!(reply, "synthesized answer");

    // plan + one node + synthesis.
    assert_eq!(reasoning.call_count(), 3);
    assert!(reasoning.prompts()[1].contains("just do the thing"));
}

#[tokio::test]
async fn oversized_plan_is_clamped() {
    let big_plan: Vec<String> = (0..12)
        .map(|i| format!(r#"{{"id": "n{i}", "task": "subtask {i}"}}"#))
        .collect();
    let plan = format!("[{}]", big_plan.join(","));

    let reasoning = Arc::new(ScriptedEngine::new("reasoning").then(plan).always("ok"));
    let (ctx, _dir) = host_with(vec![reasoning.clone()]).await;

    supervise(&ctx, "alice", "test", "fan out widely", 20).await;

    // plan + at most 8 nodes + synthesis.
    assert!(reasoning.call_count() <= 10);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Loop breaking
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn identical_tasks_trip_the_circuit_breaker() {
    // Eight sequential nodes with the same task text and the same
    // scripted 10-character output: the identical-call breaker must
    // stop execution before the DAG is exhausted.
    let nodes: Vec<String> = (0..8)
        .map(|i| {
            let dep = if i == 0 {
                String::new()
            } else {
                format!(r#", "dependsOn": ["n{}"]"#, i - 1)
            };
            format!(r#"{{"id": "n{i}", "task": "poll the queue"{dep}}}"#)
        })
        .collect();
    let plan = format!("[{}]", nodes.join(","));

    let reasoning = Arc::new(
        ScriptedEngine::new("reasoning")
            .then(plan)
            .always("same-10ch"),
    );
    let (ctx, _dir) = host_with(vec![reasoning.clone()]).await;

    supervise(&ctx, "alice", "test", "poll until done", 8).await;

    // plan + at most 5 identical node runs + synthesis; the 6th
    // identical call is never issued.
    assert!(
        reasoning.call_count() <= 7,
        "expected circuit break, saw {} calls",
        reasoning.call_count()
    );
}
