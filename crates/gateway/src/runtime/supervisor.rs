//! Supervisor — multi-subtask decomposition and wave execution.
//!
//! Plan via the reasoning engine, trim, execute topological waves in
//! parallel, watch for loops, synthesize. The whole run is bounded by
//! a wall clock; a timeout synthesizes whatever the completed waves
//! produced.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use orion_domain::config::TaskType;
use orion_domain::trace::TraceEvent;
use orion_engines::GenerateRequest;

use crate::runtime::dag::{self, TaskNode};
use crate::runtime::loop_detect::LoopDetector;
use crate::runtime::pipeline::{self, TurnRequest};
use crate::state::HostContext;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// NodeResult
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct NodeResult {
    pub node_id: String,
    pub output: String,
    pub success: bool,
    pub attempts: u32,
    pub loop_break: bool,
    pub loop_signal: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// supervise
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn supervise(
    ctx: &HostContext,
    user_id: &str,
    channel_id: &str,
    goal: &str,
    max_subtasks: usize,
) -> String {
    let wall_clock = std::time::Duration::from_secs(ctx.config.supervisor.wall_clock_secs);
    // Results accumulate outside the timed future so a timeout can
    // still synthesize partial work.
    let results: Arc<Mutex<Vec<NodeResult>>> = Arc::new(Mutex::new(Vec::new()));

    let run = run_waves(ctx, user_id, channel_id, goal, max_subtasks, results.clone());
    let timed_out = tokio::time::timeout(wall_clock, run).await.is_err();
    if timed_out {
        tracing::warn!(
            goal_preview = %goal.chars().take(60).collect::<String>(),
            "supervisor hit the wall clock, synthesizing partial results"
        );
    }

    let collected = results.lock().clone();
    synthesize(ctx, goal, &collected, timed_out).await
}

async fn run_waves(
    ctx: &HostContext,
    user_id: &str,
    channel_id: &str,
    goal: &str,
    max_subtasks: usize,
    results: Arc<Mutex<Vec<NodeResult>>>,
) {
    // ── Plan ───────────────────────────────────────────────────────
    let nodes = plan(ctx, goal, max_subtasks).await;
    let layers = dag::waves(&nodes);
    let detector = Arc::new(LoopDetector::new(ctx.config.supervisor.loop_detector.clone()));

    // ── Wave-execute ───────────────────────────────────────────────
    let mut circuit_broken = false;
    for (wave_idx, layer) in layers.into_iter().enumerate() {
        if circuit_broken {
            break;
        }
        TraceEvent::SupervisorWave {
            wave: wave_idx,
            nodes: layer.len(),
        }
        .emit();

        let futures: Vec<_> = layer
            .iter()
            .map(|node| run_node(ctx, user_id, channel_id, node, &results, &detector))
            .collect();
        let wave_results = futures_util::future::join_all(futures).await;

        circuit_broken = wave_results.iter().any(|r| r.loop_break);
        results.lock().extend(wave_results);
    }
}

// ── Planning ────────────────────────────────────────────────────────

async fn plan(ctx: &HostContext, goal: &str, max_subtasks: usize) -> Vec<TaskNode> {
    let cap = max_subtasks.clamp(1, dag::MAX_DAG_NODES);
    let prompt = format!(
        "Decompose this goal into at most {cap} subtasks.\n\
         Reply with JSON only: [{{\"id\": \"<short>\", \"task\": \"<imperative>\", \
         \"dependsOn\": [\"<id>\"], \"agentType\": \"general\"}}]\n\
         Independent subtasks must not depend on each other.\n\nGoal: {goal}"
    );
    let raw = ctx
        .orchestrator
        .generate(TaskType::Reasoning, GenerateRequest::prompt(prompt))
        .await
        .unwrap_or_default();

    let nodes = dag::parse_dag(&raw).unwrap_or_else(|| {
        tracing::debug!("planner output unparseable, falling back to a single-node DAG");
        dag::single_node(goal)
    });
    dag::trim(nodes, cap)
}

// ── Node execution ──────────────────────────────────────────────────

async fn run_node(
    ctx: &HostContext,
    user_id: &str,
    channel_id: &str,
    node: &TaskNode,
    results: &Arc<Mutex<Vec<NodeResult>>>,
    detector: &Arc<LoopDetector>,
) -> NodeResult {
    // Inject upstream outputs.
    let upstream: HashMap<String, String> = {
        let done = results.lock();
        node.depends_on
            .iter()
            .filter_map(|dep| {
                done.iter()
                    .find(|r| &r.node_id == dep)
                    .map(|r| (dep.clone(), r.output.clone()))
            })
            .collect()
    };
    let mut task_text = node.task.clone();
    if !upstream.is_empty() {
        let context_block: Vec<String> = upstream
            .iter()
            .map(|(id, output)| format!("[{id}]\n{output}"))
            .collect();
        task_text = format!(
            "{}\n\nContext from completed subtasks:\n{}",
            node.task,
            context_block.join("\n\n")
        );
    }

    // Consult the loop detector before issuing the call.
    let tool = node.agent_type.as_deref().unwrap_or("task");
    let param_hash = LoopDetector::hash_params(&json!({ "task": node.task }));
    if let Some(pattern) = detector.would_break(tool, &param_hash) {
        return NodeResult {
            node_id: node.id.clone(),
            output: String::new(),
            success: false,
            attempts: 0,
            loop_break: true,
            loop_signal: Some(pattern.to_string()),
        };
    }

    // Each node runs through the full message pipeline; supervisor
    // recursion is not a thing.
    let outcome = pipeline::run_turn(
        ctx,
        TurnRequest {
            user_id: user_id.to_string(),
            channel_id: channel_id.to_string(),
            text: task_text,
        },
    )
    .await;

    let produced_progress = {
        let done = results.lock();
        !outcome.response.is_empty() && !done.iter().any(|r| r.output == outcome.response)
    };
    let signal = detector.observe(tool, &param_hash, produced_progress);

    let loop_break = matches!(signal, crate::runtime::loop_detect::LoopSignal::Break(_));
    NodeResult {
        node_id: node.id.clone(),
        output: outcome.response,
        success: !outcome.blocked,
        attempts: 1,
        loop_break,
        loop_signal: match signal {
            crate::runtime::loop_detect::LoopSignal::Ok => None,
            crate::runtime::loop_detect::LoopSignal::Warn(p)
            | crate::runtime::loop_detect::LoopSignal::Break(p) => Some(p.to_string()),
        },
    }
}

// ── Synthesis ───────────────────────────────────────────────────────

async fn synthesize(
    ctx: &HostContext,
    goal: &str,
    results: &[NodeResult],
    timed_out: bool,
) -> String {
    if results.is_empty() {
        return "I couldn't make progress on that before running out of time.".to_string();
    }

    let sections: Vec<String> = results
        .iter()
        .map(|r| {
            format!(
                "### {} ({})\n{}",
                r.node_id,
                if r.success { "completed" } else { "failed" },
                r.output
            )
        })
        .collect();
    let completion_note = if timed_out {
        "\nNote: the run was cut short; synthesize what is available and \
         say plainly what is missing."
    } else {
        ""
    };
    let prompt = format!(
        "Combine these subtask results into one coherent answer to the goal.{completion_note}\n\n\
         Goal: {goal}\n\n{}",
        sections.join("\n\n")
    );

    let synthesis = ctx
        .orchestrator
        .generate(TaskType::Reasoning, GenerateRequest::prompt(prompt))
        .await
        .unwrap_or_default();
    if synthesis.is_empty() {
        // Engine degraded: return the raw outputs rather than nothing.
        results
            .iter()
            .filter(|r| !r.output.is_empty())
            .map(|r| r.output.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    } else {
        synthesis
    }
}
