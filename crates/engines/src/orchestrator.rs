//! Health-aware engine routing.
//!
//! The orchestrator selects engines by per-task-type priority lists,
//! skipping degraded engines while a healthy alternative exists, and
//! records every call outcome into the per-engine rolling window.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use orion_domain::config::{EnginesConfig, TaskType};
use orion_domain::error::{Error, Result};
use orion_domain::event::{BusEvent, EventBus};
use orion_domain::trace::TraceEvent;

use crate::health::{EngineStatus, HealthSnapshot, HealthTracker};
use crate::registry::EngineRegistry;
use crate::traits::{Engine, GenerateRequest};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Orchestrator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Orchestrator {
    registry: EngineRegistry,
    cfg: EnginesConfig,
    health: HashMap<String, Arc<HealthTracker>>,
    bus: Option<EventBus>,
}

/// One engine's row in the `/health` report.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub name: String,
    pub provider: String,
    #[serde(flatten)]
    pub health: HealthSnapshot,
}

/// A completed generation with its call metadata.
#[derive(Debug, Clone)]
pub struct GenerateOutcome {
    pub text: String,
    pub engine: String,
    pub provider: String,
    pub latency_ms: u64,
    pub success: bool,
}

impl Orchestrator {
    pub fn new(registry: EngineRegistry, cfg: EnginesConfig) -> Self {
        let health = registry
            .iter()
            .map(|(name, _)| {
                (
                    name.clone(),
                    Arc::new(HealthTracker::new(cfg.health.clone())),
                )
            })
            .collect();
        Self {
            registry,
            cfg,
            health,
            bus: None,
        }
    }

    /// Attach the event bus so status flips are published.
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    /// Number of distinct engines the orchestrator can route to.
    pub fn engine_count(&self) -> usize {
        self.registry.len()
    }

    // ── Routing ────────────────────────────────────────────────────

    /// Select the engine for a task type.
    ///
    /// Walks the configured priority list in order, skipping degraded
    /// engines while a non-degraded candidate exists. When every
    /// candidate is degraded, the one with the lowest P50 wins. Engines
    /// outside the priority list are a last resort, lowest P50 first.
    pub fn route(&self, task: TaskType) -> Result<Arc<dyn Engine>> {
        let list = self.cfg.priority_for(task);

        let mut listed: Vec<Arc<dyn Engine>> = Vec::new();
        for name in list {
            if let Some(engine) = self.registry.get(name) {
                listed.push(engine);
            }
        }
        // Unlisted engines, ordered by latency, as a fallback pool.
        let mut unlisted: Vec<Arc<dyn Engine>> = self
            .registry
            .iter()
            .filter(|(name, _)| !list.contains(*name))
            .map(|(_, e)| e.clone())
            .collect();
        unlisted.sort_by_key(|e| self.p50_of(e.name()).unwrap_or(u64::MAX));
        listed.extend(unlisted);

        if listed.is_empty() {
            return Err(Error::Engine {
                engine: "orchestrator".into(),
                message: format!("no engine available for task type '{task}'"),
            });
        }

        if let Some(engine) = listed
            .iter()
            .find(|e| self.status_of(e.name()) != EngineStatus::Degraded)
        {
            return Ok(engine.clone());
        }

        // Everything is degraded: least-bad by P50.
        let mut degraded = listed;
        degraded.sort_by_key(|e| self.p50_of(e.name()).unwrap_or(u64::MAX));
        Ok(degraded
            .into_iter()
            .next()
            .ok_or_else(|| Error::Engine {
                engine: "orchestrator".into(),
                message: format!("no engine available for task type '{task}'"),
            })?)
    }

    // ── Generation ─────────────────────────────────────────────────

    /// Route and call. Returns `Ok("")` when the selected engine fails
    /// or times out — callers must treat empty as "provider failed,
    /// degrade gracefully". Routing errors (no engine at all) are real
    /// errors.
    pub async fn generate(&self, task: TaskType, req: GenerateRequest) -> Result<String> {
        self.generate_full(task, req).await.map(|o| o.text)
    }

    /// As [`Self::generate`], with call metadata for telemetry.
    pub async fn generate_full(&self, task: TaskType, req: GenerateRequest) -> Result<GenerateOutcome> {
        let engine = self.route(task)?;
        let name = engine.name().to_string();
        let provider = engine.provider().to_string();

        let timeout = std::time::Duration::from_millis(self.cfg.generate_timeout_ms);
        let start = Instant::now();
        let outcome = tokio::time::timeout(timeout, engine.generate(&req)).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let (text, success) = match outcome {
            Ok(Ok(text)) if !text.is_empty() => (text, true),
            Ok(Ok(_)) => {
                tracing::warn!(engine = %name, task = %task, "engine returned empty output");
                (String::new(), false)
            }
            Ok(Err(e)) => {
                tracing::warn!(engine = %name, task = %task, error = %e, "engine call failed");
                (String::new(), false)
            }
            Err(_) => {
                tracing::warn!(
                    engine = %name,
                    task = %task,
                    timeout_ms = self.cfg.generate_timeout_ms,
                    "engine call timed out"
                );
                (String::new(), false)
            }
        };

        self.record(&name, elapsed_ms, success);
        TraceEvent::EngineCall {
            engine: name.clone(),
            task_type: task.as_str().into(),
            duration_ms: elapsed_ms,
            success,
        }
        .emit();

        Ok(GenerateOutcome {
            text,
            engine: name,
            provider,
            latency_ms: elapsed_ms,
            success,
        })
    }

    // ── Health access ──────────────────────────────────────────────

    pub fn status_of(&self, engine: &str) -> EngineStatus {
        self.health
            .get(engine)
            .map(|t| t.status())
            .unwrap_or(EngineStatus::Unknown)
    }

    pub fn p50_of(&self, engine: &str) -> Option<u64> {
        self.health.get(engine).and_then(|t| t.p50_ms())
    }

    /// Record a call outcome against an engine's window. Public so the
    /// memory store's remote-embed path shares the same health view.
    pub fn record(&self, engine: &str, latency_ms: u64, success: bool) {
        let Some(tracker) = self.health.get(engine) else {
            return;
        };
        if let Some((from, to)) = tracker.record(latency_ms, success) {
            TraceEvent::EngineStatusFlip {
                engine: engine.into(),
                from: from.as_str().into(),
                to: to.as_str().into(),
            }
            .emit();
            if let Some(bus) = &self.bus {
                bus.publish(BusEvent::EngineStatusChanged {
                    engine: engine.into(),
                    from: from.as_str().into(),
                    to: to.as_str().into(),
                });
            }
        }
    }

    /// Per-engine health rows for the `/health` endpoint.
    pub fn snapshot(&self) -> Vec<EngineSnapshot> {
        let mut rows: Vec<EngineSnapshot> = self
            .registry
            .iter()
            .map(|(name, engine)| EngineSnapshot {
                name: name.clone(),
                provider: engine.provider().to_string(),
                health: self
                    .health
                    .get(name)
                    .map(|t| t.snapshot())
                    .unwrap_or(HealthSnapshot {
                        status: EngineStatus::Unknown,
                        p50_ms: None,
                        error_rate: 0.0,
                        samples: 0,
                        last_used: None,
                    }),
            })
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }
}
