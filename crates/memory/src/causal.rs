//! Causal graph — directed weighted edges between observed events,
//! plus hyper-edges for shared membership.
//!
//! Edge strength stays in [0, 1]; evidence counts only grow.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use orion_domain::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CausalNode {
    pub id: String,
    pub user_id: String,
    pub label: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CausalEdge {
    pub from: String,
    pub to: String,
    pub strength: f64,
    pub evidence_count: u64,
}

/// An undirected membership group (events that co-occur).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HyperEdge {
    pub id: String,
    pub members: Vec<String>,
    pub label: String,
    pub strength: f64,
}

#[derive(Default)]
struct UserGraph {
    nodes: HashMap<String, CausalNode>,
    /// Keyed by (from, to).
    edges: HashMap<(String, String), CausalEdge>,
    hyper_edges: Vec<HyperEdge>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CausalGraph
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct CausalGraph {
    graphs: RwLock<HashMap<String, UserGraph>>,
    /// Strength added per new observation of the same edge.
    reinforcement: f64,
}

impl CausalGraph {
    pub fn new() -> Self {
        Self {
            graphs: RwLock::new(HashMap::new()),
            reinforcement: 0.1,
        }
    }

    /// Upsert a node by label; returns its id.
    pub fn observe_event(&self, user_id: &str, label: &str) -> String {
        let key = normalize_label(label);
        let mut graphs = self.graphs.write();
        let graph = graphs.entry(user_id.to_string()).or_default();
        if let Some(existing) = graph.nodes.get(&key) {
            return existing.id.clone();
        }
        let node = CausalNode {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            label: key.clone(),
            created_at: chrono::Utc::now(),
        };
        let id = node.id.clone();
        graph.nodes.insert(key, node);
        id
    }

    /// Reinforce `from → to`. Creates endpoints as needed.
    pub fn link(&self, user_id: &str, from: &str, to: &str) {
        let from_id = self.observe_event(user_id, from);
        let to_id = self.observe_event(user_id, to);

        let mut graphs = self.graphs.write();
        let graph = graphs.entry(user_id.to_string()).or_default();
        let edge = graph
            .edges
            .entry((from_id.clone(), to_id.clone()))
            .or_insert(CausalEdge {
                from: from_id,
                to: to_id,
                strength: 0.0,
                evidence_count: 0,
            });
        edge.strength = (edge.strength + self.reinforcement).clamp(0.0, 1.0);
        edge.evidence_count += 1;
    }

    /// Observe an ordered event sequence: consecutive pairs become
    /// edges, the whole set becomes one hyper-edge when it has at
    /// least two members.
    pub fn observe_sequence(&self, user_id: &str, labels: &[String], group_label: &str) {
        for pair in labels.windows(2) {
            self.link(user_id, &pair[0], &pair[1]);
        }
        if labels.len() >= 2 {
            // Hyper-edge membership failure can only be the <2 guard,
            // which the branch above already excludes.
            let _ = self.add_hyper_edge(user_id, labels.to_vec(), group_label);
        }
    }

    /// Hyper-edges need at least two members.
    pub fn add_hyper_edge(
        &self,
        user_id: &str,
        members: Vec<String>,
        label: &str,
    ) -> Result<String> {
        if members.len() < 2 {
            return Err(Error::Memory(
                "hyper-edge requires at least two members".into(),
            ));
        }
        let member_ids: Vec<String> = members
            .iter()
            .map(|m| self.observe_event(user_id, m))
            .collect();

        let mut graphs = self.graphs.write();
        let graph = graphs.entry(user_id.to_string()).or_default();
        let edge = HyperEdge {
            id: uuid::Uuid::new_v4().to_string(),
            members: member_ids,
            label: label.to_string(),
            strength: 0.5,
        };
        let id = edge.id.clone();
        graph.hyper_edges.push(edge);
        Ok(id)
    }

    pub fn edge(&self, user_id: &str, from: &str, to: &str) -> Option<CausalEdge> {
        let graphs = self.graphs.read();
        let graph = graphs.get(user_id)?;
        let from_id = graph.nodes.get(&normalize_label(from))?.id.clone();
        let to_id = graph.nodes.get(&normalize_label(to))?.id.clone();
        graph.edges.get(&(from_id, to_id)).cloned()
    }

    /// Render the strongest edges as a short prose block for context
    /// fusion. Empty string when the graph has nothing useful.
    pub fn summary(&self, user_id: &str, limit: usize) -> String {
        let graphs = self.graphs.read();
        let Some(graph) = graphs.get(user_id) else {
            return String::new();
        };
        let id_to_label: HashMap<&String, &String> = graph
            .nodes
            .values()
            .map(|n| (&n.id, &n.label))
            .collect();

        let mut edges: Vec<&CausalEdge> = graph.edges.values().collect();
        edges.sort_by(|a, b| {
            b.strength
                .partial_cmp(&a.strength)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.evidence_count.cmp(&a.evidence_count))
        });

        let lines: Vec<String> = edges
            .iter()
            .take(limit)
            .filter_map(|e| {
                let from = id_to_label.get(&e.from)?;
                let to = id_to_label.get(&e.to)?;
                Some(format!(
                    "- {from} tends to lead to {to} (seen {}x)",
                    e.evidence_count
                ))
            })
            .collect();
        lines.join("\n")
    }
}

impl Default for CausalGraph {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_links_reinforce_and_count() {
        let g = CausalGraph::new();
        for _ in 0..3 {
            g.link("u", "late night", "tired morning");
        }
        let edge = g.edge("u", "late night", "tired morning").unwrap();
        assert_eq!(edge.evidence_count, 3);
        assert!((edge.strength - 0.3).abs() < 1e-9);
    }

    #[test]
    fn strength_is_clamped_at_one() {
        let g = CausalGraph::new();
        for _ in 0..20 {
            g.link("u", "a", "b");
        }
        let edge = g.edge("u", "a", "b").unwrap();
        assert_eq!(edge.strength, 1.0);
        assert_eq!(edge.evidence_count, 20);
    }

    #[test]
    fn hyper_edge_requires_two_members() {
        let g = CausalGraph::new();
        assert!(g.add_hyper_edge("u", vec!["solo".into()], "grp").is_err());
        assert!(g
            .add_hyper_edge("u", vec!["a".into(), "b".into()], "grp")
            .is_ok());
    }

    #[test]
    fn observe_sequence_links_consecutive_pairs() {
        let g = CausalGraph::new();
        g.observe_sequence(
            "u",
            &["wake".into(), "coffee".into(), "work".into()],
            "morning",
        );
        assert!(g.edge("u", "wake", "coffee").is_some());
        assert!(g.edge("u", "coffee", "work").is_some());
        assert!(g.edge("u", "wake", "work").is_none());
    }

    #[test]
    fn summary_orders_by_strength() {
        let g = CausalGraph::new();
        for _ in 0..5 {
            g.link("u", "deadline", "stress");
        }
        g.link("u", "rain", "stay home");
        let summary = g.summary("u", 10);
        let first_line = summary.lines().next().unwrap();
        assert!(first_line.contains("deadline"));
        assert!(summary.contains("seen 5x"));
    }

    #[test]
    fn empty_graph_summarizes_to_empty() {
        let g = CausalGraph::new();
        assert!(g.summary("nobody", 5).is_empty());
    }
}
