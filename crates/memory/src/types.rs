use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use orion_domain::chat::ChatMessage;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MemoryEntry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One row in the vector store.
///
/// `utility` and `q_value` stay inside the configured clamp band;
/// `retrieval_count` only ever grows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub vector: Vec<f32>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub utility: f64,
    pub q_value: f64,
    pub retrieval_count: u64,
    pub success_count: u64,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl MemoryEntry {
    /// The intent/experience/utility triplet stored in metadata, when
    /// the entry carries one.
    pub fn ieu(&self) -> Option<IeuTriplet> {
        let raw = self.metadata.get("ieu")?;
        serde_json::from_value(raw.clone()).ok()
    }

    pub fn set_ieu(&mut self, triplet: &IeuTriplet) {
        if let Ok(value) = serde_json::to_value(triplet) {
            self.metadata.insert("ieu".into(), value);
        }
    }
}

/// The retrieval-and-learning record embedded in entry metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IeuTriplet {
    pub intent: String,
    pub experience: String,
    pub utility: f64,
    pub q_value: f64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Retrieval results
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A reranked search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub entry: MemoryEntry,
    /// Raw cosine similarity from phase 1.
    pub similarity: f32,
    /// Blended phase-2 score.
    pub score: f64,
}

/// Everything `build_context` produced for one turn.
#[derive(Debug, Clone, Default)]
pub struct MemoryContext {
    /// Fused prose block for the system prompt.
    pub system_context: String,
    /// Recent history as chat messages, oldest first.
    pub messages: Vec<ChatMessage>,
    /// Exactly the ids that must be acknowledged in `provide_feedback`
    /// for learning to occur.
    pub retrieved_memory_ids: Vec<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Feedback
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The per-turn learning signal handed back after a reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFeedback {
    pub user_id: String,
    /// Ids returned by `build_context` for the turn being scored.
    pub memory_ids: Vec<String>,
    /// Explicit task outcome.
    pub task_success: bool,
    /// Estimated follow-up engagement ∈ [0, 1].
    pub engagement: f64,
}

impl TaskFeedback {
    /// The effective reward: explicit success dominates, engagement
    /// modulates.
    pub fn reward(&self) -> f64 {
        let success = if self.task_success { 1.0 } else { 0.0 };
        (0.6 * success + 0.4 * self.engagement.clamp(0.0, 1.0)).clamp(0.0, 1.0)
    }
}
