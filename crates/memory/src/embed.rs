//! Embedders and the priority chain.
//!
//! The chain tries each configured embedder in order (local first, then
//! remote) and falls back to [`HashEmbedder`] — a deterministic,
//! explicitly non-semantic projection. Retrieval still works in that
//! degraded mode, but similarity means token overlap rather than
//! meaning, so the fallback logs a warning the first time it engages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sha2::{Digest, Sha256};

use orion_domain::error::Result;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Embedder trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;
    fn dim(&self) -> usize;
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HashEmbedder
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Deterministic hashing projection: each lowercased token lands in a
/// bucket with a hash-derived sign, weighted by count, L2-normalized.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn project(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dim];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u64::from_le_bytes(
                digest[..8].try_into().unwrap_or([0u8; 8]),
            ) as usize
                % self.dim;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait::async_trait]
impl Embedder for HashEmbedder {
    fn name(&self) -> &str {
        "hash-fallback"
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.project(text))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// EmbedderChain
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct EmbedderChain {
    embedders: Vec<Arc<dyn Embedder>>,
    fallback: HashEmbedder,
    warned_degraded: AtomicBool,
}

impl EmbedderChain {
    /// `embedders` in priority order (local first, remote second); the
    /// hash fallback is always appended implicitly.
    pub fn new(embedders: Vec<Arc<dyn Embedder>>, dim: usize) -> Self {
        Self {
            embedders,
            fallback: HashEmbedder::new(dim),
            warned_degraded: AtomicBool::new(false),
        }
    }

    pub fn dim(&self) -> usize {
        self.fallback.dim
    }

    /// Embed through the chain. Never fails: the fallback is total.
    /// Returns the vector and the name of the embedder that produced it.
    pub async fn embed(&self, text: &str) -> (Vec<f32>, &str) {
        for embedder in &self.embedders {
            if embedder.dim() != self.fallback.dim {
                tracing::warn!(
                    embedder = %embedder.name(),
                    "embedder dimension mismatch, skipping"
                );
                continue;
            }
            match embedder.embed(text).await {
                Ok(vector) if vector.len() == self.fallback.dim => {
                    return (vector, embedder.name());
                }
                Ok(_) => {
                    tracing::warn!(embedder = %embedder.name(), "embedder returned wrong dimension");
                }
                Err(e) => {
                    tracing::warn!(embedder = %embedder.name(), error = %e, "embedder failed, trying next");
                }
            }
        }

        if !self.warned_degraded.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                "all semantic embedders unavailable; using the non-semantic hash fallback"
            );
        }
        (self.fallback.project(text), self.fallback.name())
    }
}
