//! ANN port.
//!
//! The two-phase ranker lives above this interface; an implementation
//! only needs user-scoped upsert, cosine-similarity search, and
//! deletion. The in-memory index backs tests and single-host
//! deployments; a vendor store plugs in behind the same trait.

use std::collections::HashMap;

use parking_lot::RwLock;

use orion_domain::error::{Error, Result};

use crate::types::MemoryEntry;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Port
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
pub trait AnnIndex: Send + Sync {
    /// Insert or replace an entry by id.
    async fn upsert(&self, entry: MemoryEntry) -> Result<()>;

    /// Fetch one entry.
    async fn get(&self, user_id: &str, id: &str) -> Result<Option<MemoryEntry>>;

    /// `k` nearest entries for the user, best first, with cosine
    /// similarity attached.
    async fn vector_search(
        &self,
        user_id: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<(MemoryEntry, f32)>>;

    /// Delete entries by id; returns how many existed.
    async fn delete_ids(&self, user_id: &str, ids: &[String]) -> Result<usize>;

    /// Entries stored for one user.
    async fn count(&self, user_id: &str) -> Result<usize>;

    /// Distinct users with at least one entry.
    async fn user_count(&self) -> Result<usize>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// In-memory implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct InMemoryAnnIndex {
    dim: usize,
    rows: RwLock<HashMap<String, HashMap<String, MemoryEntry>>>,
}

impl InMemoryAnnIndex {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            rows: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait::async_trait]
impl AnnIndex for InMemoryAnnIndex {
    async fn upsert(&self, entry: MemoryEntry) -> Result<()> {
        if entry.vector.len() != self.dim {
            return Err(Error::Memory(format!(
                "vector dimension {} does not match index dimension {}",
                entry.vector.len(),
                self.dim
            )));
        }
        self.rows
            .write()
            .entry(entry.user_id.clone())
            .or_default()
            .insert(entry.id.clone(), entry);
        Ok(())
    }

    async fn get(&self, user_id: &str, id: &str) -> Result<Option<MemoryEntry>> {
        Ok(self
            .rows
            .read()
            .get(user_id)
            .and_then(|m| m.get(id))
            .cloned())
    }

    async fn vector_search(
        &self,
        user_id: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<(MemoryEntry, f32)>> {
        if vector.len() != self.dim {
            return Err(Error::Memory(format!(
                "query dimension {} does not match index dimension {}",
                vector.len(),
                self.dim
            )));
        }
        let rows = self.rows.read();
        let Some(user_rows) = rows.get(user_id) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<(MemoryEntry, f32)> = user_rows
            .values()
            .map(|entry| (entry.clone(), cosine_similarity(&entry.vector, vector)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn delete_ids(&self, user_id: &str, ids: &[String]) -> Result<usize> {
        let mut rows = self.rows.write();
        let Some(user_rows) = rows.get_mut(user_id) else {
            return Ok(0);
        };
        let mut removed = 0;
        for id in ids {
            if user_rows.remove(id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn count(&self, user_id: &str) -> Result<usize> {
        Ok(self.rows.read().get(user_id).map(|m| m.len()).unwrap_or(0))
    }

    async fn user_count(&self) -> Result<usize> {
        Ok(self.rows.read().len())
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    fn entry(user: &str, id: &str, vector: Vec<f32>) -> MemoryEntry {
        MemoryEntry {
            id: id.into(),
            user_id: user.into(),
            content: format!("content {id}"),
            vector,
            created_at: chrono::Utc::now(),
            utility: 0.5,
            q_value: 0.5,
            retrieval_count: 0,
            success_count: 0,
            metadata: StdHashMap::new(),
        }
    }

    #[tokio::test]
    async fn search_is_user_scoped() {
        let index = InMemoryAnnIndex::new(2);
        index.upsert(entry("alice", "a1", vec![1.0, 0.0])).await.unwrap();
        index.upsert(entry("bob", "b1", vec![1.0, 0.0])).await.unwrap();

        let hits = index.vector_search("alice", &[1.0, 0.0], 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.id, "a1");
    }

    #[tokio::test]
    async fn search_orders_by_similarity() {
        let index = InMemoryAnnIndex::new(2);
        index.upsert(entry("u", "near", vec![1.0, 0.1])).await.unwrap();
        index.upsert(entry("u", "far", vec![0.0, 1.0])).await.unwrap();

        let hits = index.vector_search("u", &[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits[0].0.id, "near");
        assert!(hits[0].1 > hits[1].1);
    }

    #[tokio::test]
    async fn dimension_mismatch_is_rejected() {
        let index = InMemoryAnnIndex::new(3);
        let err = index.upsert(entry("u", "x", vec![1.0, 0.0])).await;
        assert!(err.is_err());
        assert!(index.vector_search("u", &[1.0], 1).await.is_err());
    }

    #[tokio::test]
    async fn delete_and_counts() {
        let index = InMemoryAnnIndex::new(1);
        index.upsert(entry("u", "a", vec![1.0])).await.unwrap();
        index.upsert(entry("u", "b", vec![0.5])).await.unwrap();
        assert_eq!(index.count("u").await.unwrap(), 2);
        assert_eq!(index.user_count().await.unwrap(), 1);

        let removed = index
            .delete_ids("u", &["a".into(), "missing".into()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(index.count("u").await.unwrap(), 1);
    }

    #[test]
    fn cosine_handles_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }
}
