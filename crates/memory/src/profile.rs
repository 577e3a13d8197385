//! User profiles: facts, opinions, and topics extracted from turns.
//!
//! Facts are keyed by normalized snake_case; opinions by lowercased
//! belief text. On merge, the higher-confidence fact wins and opinion
//! stances average.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fact {
    pub value: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Opinion {
    /// Agreement with the belief, -1 (opposed) .. 1 (held strongly).
    pub stance: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserProfile {
    #[serde(default)]
    pub facts: HashMap<String, Fact>,
    #[serde(default)]
    pub opinions: HashMap<String, Opinion>,
    #[serde(default)]
    pub topics: Vec<String>,
}

impl UserProfile {
    /// Merge `other` in: higher-confidence facts win, opinions average,
    /// topics union while preserving order.
    pub fn merge(&mut self, other: UserProfile) {
        for (key, fact) in other.facts {
            let key = normalize_fact_key(&key);
            match self.facts.get(&key) {
                Some(existing) if existing.confidence >= fact.confidence => {}
                _ => {
                    self.facts.insert(key, fact);
                }
            }
        }

        for (belief, opinion) in other.opinions {
            let belief = belief.to_lowercase();
            match self.opinions.get_mut(&belief) {
                Some(existing) => {
                    existing.stance = (existing.stance + opinion.stance) / 2.0;
                    existing.confidence = (existing.confidence + opinion.confidence) / 2.0;
                }
                None => {
                    self.opinions.insert(belief, opinion);
                }
            }
        }

        for topic in other.topics {
            if !self.topics.iter().any(|t| t.eq_ignore_ascii_case(&topic)) {
                self.topics.push(topic);
            }
        }
    }

    /// Short prose rendering for prompt injection. Empty when nothing
    /// is known.
    pub fn render(&self, max_facts: usize) -> String {
        let mut parts = Vec::new();
        if !self.facts.is_empty() {
            let mut facts: Vec<(&String, &Fact)> = self.facts.iter().collect();
            facts.sort_by(|a, b| {
                b.1.confidence
                    .partial_cmp(&a.1.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.0.cmp(b.0))
            });
            let lines: Vec<String> = facts
                .iter()
                .take(max_facts)
                .map(|(k, f)| format!("- {}: {}", k, f.value))
                .collect();
            parts.push(format!("Known facts:\n{}", lines.join("\n")));
        }
        if !self.topics.is_empty() {
            parts.push(format!("Recurring topics: {}", self.topics.join(", ")));
        }
        parts.join("\n\n")
    }
}

/// `"Favorite Coffee "` → `"favorite_coffee"`.
pub fn normalize_fact_key(key: &str) -> String {
    key.trim()
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Parse an extraction reply. Returns `None` on any malformation —
/// the caller skips extraction for the turn (bounded fallback).
pub fn parse_extraction(raw: &str) -> Option<UserProfile> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    let parsed: UserProfile = serde_json::from_str(&raw[start..=end]).ok()?;
    let mut profile = UserProfile::default();
    // Re-key through normalization so LLM-provided keys conform.
    for (key, fact) in parsed.facts {
        profile.facts.insert(normalize_fact_key(&key), fact);
    }
    for (belief, opinion) in parsed.opinions {
        profile.opinions.insert(belief.to_lowercase(), opinion);
    }
    profile.topics = parsed.topics;
    Some(profile)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ProfileStore
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ProfileStore {
    profiles: RwLock<HashMap<String, UserProfile>>,
}

impl ProfileStore {
    pub fn new() -> Self {
        Self {
            profiles: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, user_id: &str) -> UserProfile {
        self.profiles
            .read()
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn merge_into(&self, user_id: &str, update: UserProfile) {
        self.profiles
            .write()
            .entry(user_id.to_string())
            .or_default()
            .merge(update);
    }
}

impl Default for ProfileStore {
    fn default() -> Self {
        Self::new()
    }
}
