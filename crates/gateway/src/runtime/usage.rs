//! Usage telemetry: ring-buffered per-call records with batched flush.
//!
//! Records accumulate in a bounded ring; a background task flushes
//! every few seconds or when the buffer fills. A failed flush requeues
//! the whole batch at the head so no record is lost or double-counted;
//! if requeueing would exceed capacity, the oldest records fall off.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Notify;

use orion_domain::config::UsageConfig;
use orion_domain::trace::TraceEvent;
use orion_store::{Persistence, UsageEvent};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// UsageRecorder
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct UsageRecorder {
    cfg: UsageConfig,
    buffer: Mutex<VecDeque<UsageEvent>>,
    flush_signal: Notify,
    store: Arc<dyn Persistence>,
}

/// Aggregate rows for `/api/usage/summary`.
#[derive(Debug, Clone, Serialize, Default)]
pub struct UsageSummary {
    pub calls: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub estimated_cost_usd: f64,
}

impl UsageRecorder {
    pub fn new(cfg: UsageConfig, store: Arc<dyn Persistence>) -> Self {
        Self {
            cfg,
            buffer: Mutex::new(VecDeque::new()),
            flush_signal: Notify::new(),
            store,
        }
    }

    /// Record one engine call. Applies pricing; never blocks on I/O.
    pub fn record(&self, mut event: UsageEvent) {
        if let Some(pricing) = self.cfg.pricing_for(&event.provider, &event.model) {
            event.estimated_cost_usd =
                pricing.estimate_cost(event.input_tokens, event.output_tokens);
        }

        let should_flush = {
            let mut buffer = self.buffer.lock();
            if buffer.len() >= self.cfg.buffer_capacity {
                buffer.pop_front();
                tracing::warn!("usage buffer full, dropped oldest record");
            }
            buffer.push_back(event);
            buffer.len() >= self.cfg.buffer_capacity
        };
        if should_flush {
            self.flush_signal.notify_one();
        }
    }

    pub fn buffered(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Drain and persist the buffer once. On failure the batch goes
    /// back to the head, preserving arrival order within it.
    pub async fn flush(&self) -> usize {
        let batch: Vec<UsageEvent> = {
            let mut buffer = self.buffer.lock();
            buffer.drain(..).collect()
        };
        if batch.is_empty() {
            return 0;
        }

        match self.store.append_usage_batch(&batch).await {
            Ok(()) => {
                TraceEvent::UsageFlush {
                    records: batch.len(),
                    requeued: 0,
                }
                .emit();
                batch.len()
            }
            Err(e) => {
                let requeued = batch.len();
                tracing::warn!(error = %e, records = requeued, "usage flush failed, requeueing batch");
                let mut buffer = self.buffer.lock();
                for event in batch.into_iter().rev() {
                    buffer.push_front(event);
                }
                while buffer.len() > self.cfg.buffer_capacity {
                    buffer.pop_front();
                }
                TraceEvent::UsageFlush {
                    records: 0,
                    requeued,
                }
                .emit();
                0
            }
        }
    }

    /// Background flush loop: every interval or on a full-buffer nudge.
    pub async fn run_flush_loop(self: Arc<Self>) {
        let interval = std::time::Duration::from_secs(self.cfg.flush_interval_secs.max(1));
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = self.flush_signal.notified() => {}
            }
            self.flush().await;
        }
    }

    /// Aggregate a user's usage over the trailing `days`.
    pub async fn summary(&self, user_id: &str, days: u32) -> UsageSummary {
        let since = chrono::Utc::now() - chrono::Duration::days(days.max(1) as i64);
        let rows = match self.store.usage_since(user_id, since).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "usage summary query failed");
                return UsageSummary::default();
            }
        };
        let mut summary = UsageSummary::default();
        for row in rows {
            summary.calls += 1;
            summary.input_tokens += row.input_tokens;
            summary.output_tokens += row.output_tokens;
            summary.estimated_cost_usd += row.estimated_cost_usd;
        }
        summary
    }
}

/// Build a usage event from a completed engine call. Token counts are
/// estimated from text lengths when the adapter reports none.
pub fn usage_event_for(
    user_id: &str,
    task_type: &str,
    engine_provider: &str,
    engine_model: &str,
    prompt_chars: usize,
    completion_chars: usize,
    latency_ms: u64,
) -> UsageEvent {
    UsageEvent {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user_id.into(),
        provider: engine_provider.into(),
        model: engine_model.into(),
        task_type: task_type.into(),
        input_tokens: (prompt_chars / 4) as u64,
        output_tokens: (completion_chars / 4) as u64,
        latency_ms,
        estimated_cost_usd: 0.0,
        created_at: chrono::Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orion_domain::error::{Error, Result};
    use orion_store::{InMemoryStore, StoredMessage};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// A store whose usage writes fail until `healed`.
    struct FlakyStore {
        inner: InMemoryStore,
        healed: AtomicBool,
    }

    #[async_trait::async_trait]
    impl Persistence for FlakyStore {
        async fn init(&self) -> Result<()> {
            Ok(())
        }
        async fn append_message(&self, message: StoredMessage) -> Result<()> {
            self.inner.append_message(message).await
        }
        async fn message_history(
            &self,
            user_id: &str,
            channel_id: &str,
            limit: usize,
        ) -> Result<Vec<StoredMessage>> {
            self.inner.message_history(user_id, channel_id, limit).await
        }
        async fn append_usage_batch(&self, batch: &[UsageEvent]) -> Result<()> {
            if self.healed.load(Ordering::SeqCst) {
                self.inner.append_usage_batch(batch).await
            } else {
                Err(Error::Store("disk on fire".into()))
            }
        }
        async fn usage_since(
            &self,
            user_id: &str,
            since: chrono::DateTime<chrono::Utc>,
        ) -> Result<Vec<UsageEvent>> {
            self.inner.usage_since(user_id, since).await
        }
    }

    fn event(user: &str) -> UsageEvent {
        usage_event_for(user, "reasoning", "scripted", "test", 400, 200, 12)
    }

    #[tokio::test]
    async fn flush_persists_in_order() {
        let store = Arc::new(InMemoryStore::new());
        let recorder = UsageRecorder::new(UsageConfig::default(), store.clone());
        for _ in 0..3 {
            recorder.record(event("u"));
        }
        assert_eq!(recorder.buffered(), 3);
        assert_eq!(recorder.flush().await, 3);
        assert_eq!(recorder.buffered(), 0);
        assert_eq!(store.usage_count(), 3);
    }

    #[tokio::test]
    async fn failed_flush_requeues_without_double_count() {
        let store = Arc::new(FlakyStore {
            inner: InMemoryStore::new(),
            healed: AtomicBool::new(false),
        });
        let recorder = UsageRecorder::new(UsageConfig::default(), store.clone());
        for _ in 0..4 {
            recorder.record(event("u"));
        }

        assert_eq!(recorder.flush().await, 0);
        assert_eq!(recorder.buffered(), 4, "failed batch returns to the buffer");

        store.healed.store(true, Ordering::SeqCst);
        assert_eq!(recorder.flush().await, 4);
        assert_eq!(recorder.buffered(), 0);
        assert_eq!(store.inner.usage_count(), 4, "records persist exactly once");
    }

    #[tokio::test]
    async fn pricing_applies_at_record_time() {
        let mut cfg = UsageConfig::default();
        cfg.pricing.insert(
            "scripted/*".into(),
            orion_domain::config::ModelPricing {
                input_per_mtok: 1_000_000.0,
                output_per_mtok: 0.0,
            },
        );
        let store = Arc::new(InMemoryStore::new());
        let recorder = UsageRecorder::new(cfg, store.clone());
        recorder.record(event("u"));
        recorder.flush().await;

        let since = chrono::Utc::now() - chrono::Duration::hours(1);
        let rows = store.usage_since("u", since).await.unwrap();
        assert_eq!(rows[0].estimated_cost_usd, 100.0);
    }

    #[tokio::test]
    async fn summary_aggregates_user_rows() {
        let store = Arc::new(InMemoryStore::new());
        let recorder = UsageRecorder::new(UsageConfig::default(), store);
        recorder.record(event("u"));
        recorder.record(event("u"));
        recorder.record(event("other"));
        recorder.flush().await;

        let summary = recorder.summary("u", 7).await;
        assert_eq!(summary.calls, 2);
        assert_eq!(summary.input_tokens, 200);
    }
}
