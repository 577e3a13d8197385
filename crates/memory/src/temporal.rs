//! Hierarchical temporal index.
//!
//! Level 0 holds raw records, level 1 summaries of batches of level 0,
//! level 2 long-term distillations. A node with `valid_until` set has
//! been folded into a summary and is never returned by live reads.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TemporalNode
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalNode {
    pub id: String,
    pub user_id: String,
    pub content: String,
    /// 0 = raw, 1 = summary, 2 = long-term distillation.
    pub level: u8,
    pub category: String,
    pub valid_from: chrono::DateTime<chrono::Utc>,
    pub valid_until: Option<chrono::DateTime<chrono::Utc>>,
}

impl TemporalNode {
    pub fn is_live(&self) -> bool {
        self.valid_until.is_none()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TemporalIndex
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct TemporalIndex {
    nodes: RwLock<HashMap<String, Vec<TemporalNode>>>,
}

impl TemporalIndex {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(
        &self,
        user_id: &str,
        content: impl Into<String>,
        level: u8,
        category: impl Into<String>,
    ) -> String {
        let node = TemporalNode {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            content: content.into(),
            level: level.min(2),
            category: category.into(),
            valid_from: chrono::Utc::now(),
            valid_until: None,
        };
        let id = node.id.clone();
        self.nodes
            .write()
            .entry(user_id.to_string())
            .or_default()
            .push(node);
        id
    }

    /// Live nodes at a level, oldest first.
    pub fn live_at_level(&self, user_id: &str, level: u8) -> Vec<TemporalNode> {
        let nodes = self.nodes.read();
        let mut live: Vec<TemporalNode> = nodes
            .get(user_id)
            .map(|v| {
                v.iter()
                    .filter(|n| n.is_live() && n.level == level)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        live.sort_by_key(|n| n.valid_from);
        live
    }

    pub fn live_level0_count(&self, user_id: &str) -> usize {
        self.nodes
            .read()
            .get(user_id)
            .map(|v| v.iter().filter(|n| n.is_live() && n.level == 0).count())
            .unwrap_or(0)
    }

    /// The `n` oldest live level-0 nodes (compression input).
    pub fn oldest_live_level0(&self, user_id: &str, n: usize) -> Vec<TemporalNode> {
        let mut live = self.live_at_level(user_id, 0);
        live.truncate(n);
        live
    }

    /// Mark nodes as folded; they disappear from live reads.
    pub fn invalidate(&self, user_id: &str, ids: &[String]) -> usize {
        let now = chrono::Utc::now();
        let mut nodes = self.nodes.write();
        let Some(user_nodes) = nodes.get_mut(user_id) else {
            return 0;
        };
        let mut marked = 0;
        for node in user_nodes.iter_mut() {
            if node.is_live() && ids.contains(&node.id) {
                node.valid_until = Some(now);
                marked += 1;
            }
        }
        marked
    }

    /// Hierarchical recent history: distillations first, then summaries,
    /// then the newest raw records, newest last.
    pub fn recent_context(&self, user_id: &str, raw_limit: usize) -> Vec<TemporalNode> {
        let mut out = self.live_at_level(user_id, 2);
        out.extend(self.live_at_level(user_id, 1));
        let mut raw = self.live_at_level(user_id, 0);
        if raw.len() > raw_limit {
            raw.drain(..raw.len() - raw_limit);
        }
        out.extend(raw);
        out
    }
}

impl Default for TemporalIndex {
    fn default() -> Self {
        Self::new()
    }
}
