//! Task DAG: planner-output parsing, trimming, and wave layering.

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TaskNode
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskNode {
    pub id: String,
    pub task: String,
    #[serde(default, alias = "dependsOn")]
    pub depends_on: Vec<String>,
    #[serde(default, alias = "agentType")]
    pub agent_type: Option<String>,
}

/// Hard ceiling on DAG size regardless of caller input.
pub const MAX_DAG_NODES: usize = 8;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parse the planner's JSON. Accepts either a bare array of nodes or
/// an object with a `subtasks` array. `None` on any malformation — the
/// caller falls back to a single-node DAG.
pub fn parse_dag(raw: &str) -> Option<Vec<TaskNode>> {
    let start = raw.find(['[', '{'])?;
    let end = raw.rfind([']', '}'])?;
    if end <= start {
        return None;
    }
    let json = &raw[start..=end];

    if let Ok(nodes) = serde_json::from_str::<Vec<TaskNode>>(json) {
        return non_empty(nodes);
    }

    #[derive(Deserialize)]
    struct Wrapper {
        subtasks: Vec<TaskNode>,
    }
    serde_json::from_str::<Wrapper>(json)
        .ok()
        .and_then(|w| non_empty(w.subtasks))
}

fn non_empty(nodes: Vec<TaskNode>) -> Option<Vec<TaskNode>> {
    let nodes: Vec<TaskNode> = nodes
        .into_iter()
        .filter(|n| !n.id.trim().is_empty() && !n.task.trim().is_empty())
        .collect();
    (!nodes.is_empty()).then_some(nodes)
}

/// A one-node DAG around the raw goal.
pub fn single_node(goal: &str) -> Vec<TaskNode> {
    vec![TaskNode {
        id: "goal".into(),
        task: goal.to_string(),
        depends_on: Vec::new(),
        agent_type: None,
    }]
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trimming
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Clamp to `max(1, min(8, max_subtasks))` nodes and drop dangling
/// dependencies (references to ids outside the trimmed set).
pub fn trim(mut nodes: Vec<TaskNode>, max_subtasks: usize) -> Vec<TaskNode> {
    let cap = max_subtasks.clamp(1, MAX_DAG_NODES);
    nodes.truncate(cap);

    let ids: Vec<String> = nodes.iter().map(|n| n.id.clone()).collect();
    for node in &mut nodes {
        node.depends_on.retain(|dep| ids.contains(dep));
        // Self-dependencies count as dangling.
        let own = node.id.clone();
        node.depends_on.retain(|dep| *dep != own);
    }
    nodes
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wave layering
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Topological layers: wave N contains nodes whose dependencies all
/// completed in waves < N. Nodes stuck in a dependency cycle are
/// appended as a final wave with their dependencies cleared.
pub fn waves(nodes: &[TaskNode]) -> Vec<Vec<TaskNode>> {
    let mut remaining: Vec<TaskNode> = nodes.to_vec();
    let mut done: Vec<String> = Vec::new();
    let mut layers: Vec<Vec<TaskNode>> = Vec::new();

    while !remaining.is_empty() {
        let (ready, blocked): (Vec<TaskNode>, Vec<TaskNode>) = remaining
            .into_iter()
            .partition(|n| n.depends_on.iter().all(|d| done.contains(d)));

        if ready.is_empty() {
            // Cycle: break it by running the rest as one last wave.
            tracing::warn!(
                nodes = blocked.len(),
                "dependency cycle in task DAG, forcing final wave"
            );
            let mut forced = blocked;
            for node in &mut forced {
                node.depends_on.clear();
            }
            layers.push(forced);
            break;
        }

        done.extend(ready.iter().map(|n| n.id.clone()));
        layers.push(ready);
        remaining = blocked;
    }

    layers
}
