//! Engine registry.
//!
//! Holds all engine adapters that passed their availability probe at
//! startup. Engines that fail the probe are skipped, not fatal — the
//! host boots and surfaces the gap through `/health`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::traits::Engine;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// EngineRegistry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct EngineRegistry {
    engines: HashMap<String, Arc<dyn Engine>>,
    /// Candidates that failed their startup probe, for diagnostics.
    probe_failures: Vec<String>,
}

impl EngineRegistry {
    /// Probe each candidate and register the ones that answer.
    pub async fn probe(candidates: Vec<Arc<dyn Engine>>) -> Self {
        let mut engines: HashMap<String, Arc<dyn Engine>> = HashMap::new();
        let mut probe_failures = Vec::new();

        for engine in candidates {
            let name = engine.name().to_string();
            if engine.is_available().await {
                tracing::info!(engine = %name, provider = %engine.provider(), "registered engine");
                engines.insert(name, engine);
            } else {
                tracing::warn!(engine = %name, "engine unavailable at startup, skipping");
                probe_failures.push(name);
            }
        }

        if engines.is_empty() {
            tracing::warn!(
                failed = probe_failures.len(),
                "no engines available; generation requests will degrade to empty replies"
            );
        }

        Self {
            engines,
            probe_failures,
        }
    }

    /// Build a registry without probing (test setups).
    pub fn from_engines(candidates: Vec<Arc<dyn Engine>>) -> Self {
        let engines = candidates
            .into_iter()
            .map(|e| (e.name().to_string(), e))
            .collect();
        Self {
            engines,
            probe_failures: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Engine>> {
        self.engines.get(name).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Arc<dyn Engine>)> {
        self.engines.iter()
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    /// Registered engine names (sorted).
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.engines.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn probe_failures(&self) -> &[String] {
        &self.probe_failures
    }
}
