//! Deterministic scripted engines for tests.
//!
//! No network, no timing jitter beyond an optional fixed delay. Other
//! crates use these in their own test suites, so this module is part of
//! the public API rather than `#[cfg(test)]`.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use orion_domain::error::{Error, Result};

use crate::traits::{Engine, GenerateRequest};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ScriptedEngine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An engine that replays scripted responses and records every prompt
/// it was asked.
pub struct ScriptedEngine {
    name: String,
    provider: String,
    available: bool,
    latency_ms: u64,
    fail_all: bool,
    /// One-shot responses consumed in order; when empty, `fallback`.
    script: Mutex<VecDeque<String>>,
    fallback: String,
    calls: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedEngine {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: "scripted".into(),
            available: true,
            latency_ms: 0,
            fail_all: false,
            script: Mutex::new(VecDeque::new()),
            fallback: "ok".into(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Respond with `text` once the scripted queue is exhausted.
    pub fn always(mut self, text: impl Into<String>) -> Self {
        self.fallback = text.into();
        self
    }

    /// Queue a one-shot response.
    pub fn then(self, text: impl Into<String>) -> Self {
        self.script.lock().push_back(text.into());
        self
    }

    /// Every call returns an engine error.
    pub fn failing(mut self) -> Self {
        self.fail_all = true;
        self
    }

    /// Fail the startup availability probe.
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Sleep this long on each call (drives timeout tests).
    pub fn with_latency_ms(mut self, ms: u64) -> Self {
        self.latency_ms = ms;
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// Prompts seen so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.calls.lock().iter().map(|r| r.prompt.clone()).collect()
    }

    /// System prompts seen so far, in call order.
    pub fn system_prompts(&self) -> Vec<Option<String>> {
        self.calls
            .lock()
            .iter()
            .map(|r| r.system_prompt.clone())
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn into_arc(self) -> Arc<dyn Engine> {
        Arc::new(self)
    }
}

#[async_trait::async_trait]
impl Engine for ScriptedEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider(&self) -> &str {
        &self.provider
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn generate(&self, req: &GenerateRequest) -> Result<String> {
        self.calls.lock().push(req.clone());
        if self.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.latency_ms)).await;
        }
        if self.fail_all {
            return Err(Error::Engine {
                engine: self.name.clone(),
                message: "scripted failure".into(),
            });
        }
        if let Some(next) = self.script.lock().pop_front() {
            return Ok(next);
        }
        Ok(self.fallback.clone())
    }
}
