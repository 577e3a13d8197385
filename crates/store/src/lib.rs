//! Entity-oriented persistence port and its bundled implementations.
//!
//! The port is deliberately not SQL-shaped: the host persists message
//! history and usage batches through it and nothing else leaks through.
//! `InMemoryStore` backs tests; `JsonFileStore` appends JSON lines under
//! a data directory for single-host deployments.

pub mod notes;

use std::path::PathBuf;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use orion_domain::error::{Error, Result};

pub use notes::NotesWriter;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Entities
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub user_id: String,
    pub channel_id: String,
    pub role: String,
    pub content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl StoredMessage {
    pub fn new(user_id: &str, channel_id: &str, role: &str, content: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            channel_id: channel_id.into(),
            role: role.into(),
            content: content.into(),
            created_at: chrono::Utc::now(),
        }
    }
}

/// One engine call's worth of telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    pub id: String,
    pub user_id: String,
    pub provider: String,
    pub model: String,
    pub task_type: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub latency_ms: u64,
    pub estimated_cost_usd: f64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Port
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
pub trait Persistence: Send + Sync {
    /// One-time startup initialization. Failure here is one of the two
    /// hard-crash conditions of the host.
    async fn init(&self) -> Result<()>;

    async fn append_message(&self, message: StoredMessage) -> Result<()>;

    /// Newest-last history for a session.
    async fn message_history(
        &self,
        user_id: &str,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>>;

    /// Persist a usage batch atomically: either the whole batch lands
    /// or the call errors and the caller requeues it.
    async fn append_usage_batch(&self, batch: &[UsageEvent]) -> Result<()>;

    async fn usage_since(
        &self,
        user_id: &str,
        since: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<UsageEvent>>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// In-memory implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
pub struct InMemoryStore {
    messages: Mutex<Vec<StoredMessage>>,
    usage: Mutex<Vec<UsageEvent>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn usage_count(&self) -> usize {
        self.usage.lock().len()
    }
}

#[async_trait::async_trait]
impl Persistence for InMemoryStore {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn append_message(&self, message: StoredMessage) -> Result<()> {
        self.messages.lock().push(message);
        Ok(())
    }

    async fn message_history(
        &self,
        user_id: &str,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>> {
        let messages = self.messages.lock();
        let mut history: Vec<StoredMessage> = messages
            .iter()
            .filter(|m| m.user_id == user_id && m.channel_id == channel_id)
            .cloned()
            .collect();
        if history.len() > limit {
            history.drain(..history.len() - limit);
        }
        Ok(history)
    }

    async fn append_usage_batch(&self, batch: &[UsageEvent]) -> Result<()> {
        self.usage.lock().extend_from_slice(batch);
        Ok(())
    }

    async fn usage_since(
        &self,
        user_id: &str,
        since: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<UsageEvent>> {
        Ok(self
            .usage
            .lock()
            .iter()
            .filter(|u| u.user_id == user_id && u.created_at >= since)
            .cloned()
            .collect())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// JSON-lines file implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct JsonFileStore {
    data_dir: PathBuf,
    /// Serializes file appends.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn messages_path(&self) -> PathBuf {
        self.data_dir.join("messages.jsonl")
    }

    fn usage_path(&self) -> PathBuf {
        self.data_dir.join("usage.jsonl")
    }

    fn append_lines(&self, path: &PathBuf, lines: &[String]) -> Result<()> {
        use std::io::Write;
        let _guard = self.write_lock.lock();
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        for line in lines {
            writeln!(file, "{line}")?;
        }
        Ok(())
    }

    fn read_lines<T: for<'de> Deserialize<'de>>(&self, path: &PathBuf) -> Result<Vec<T>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(path)?;
        let mut rows = Vec::new();
        for line in raw.lines() {
            match serde_json::from_str::<T>(line) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping corrupt store line");
                }
            }
        }
        Ok(rows)
    }
}

#[async_trait::async_trait]
impl Persistence for JsonFileStore {
    async fn init(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir).map_err(|e| {
            Error::Store(format!(
                "cannot create data dir {}: {e}",
                self.data_dir.display()
            ))
        })?;
        Ok(())
    }

    async fn append_message(&self, message: StoredMessage) -> Result<()> {
        let line = serde_json::to_string(&message)?;
        self.append_lines(&self.messages_path(), &[line])
    }

    async fn message_history(
        &self,
        user_id: &str,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>> {
        let mut history: Vec<StoredMessage> = self
            .read_lines::<StoredMessage>(&self.messages_path())?
            .into_iter()
            .filter(|m| m.user_id == user_id && m.channel_id == channel_id)
            .collect();
        if history.len() > limit {
            history.drain(..history.len() - limit);
        }
        Ok(history)
    }

    async fn append_usage_batch(&self, batch: &[UsageEvent]) -> Result<()> {
        let mut lines = Vec::with_capacity(batch.len());
        for event in batch {
            lines.push(serde_json::to_string(event)?);
        }
        self.append_lines(&self.usage_path(), &lines)
    }

    async fn usage_since(
        &self,
        user_id: &str,
        since: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<UsageEvent>> {
        Ok(self
            .read_lines::<UsageEvent>(&self.usage_path())?
            .into_iter()
            .filter(|u| u.user_id == user_id && u.created_at >= since)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(user: &str, cost: f64) -> UsageEvent {
        UsageEvent {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user.into(),
            provider: "scripted".into(),
            model: "test".into(),
            task_type: "reasoning".into(),
            input_tokens: 10,
            output_tokens: 20,
            latency_ms: 5,
            estimated_cost_usd: cost,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn in_memory_history_is_session_scoped() {
        let store = InMemoryStore::new();
        store
            .append_message(StoredMessage::new("u", "cli", "user", "hi"))
            .await
            .unwrap();
        store
            .append_message(StoredMessage::new("u", "web", "user", "other"))
            .await
            .unwrap();

        let history = store.message_history("u", "cli", 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "hi");
    }

    #[tokio::test]
    async fn file_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("data"));
        store.init().await.unwrap();

        store
            .append_message(StoredMessage::new("u", "cli", "user", "hello"))
            .await
            .unwrap();
        store
            .append_message(StoredMessage::new("u", "cli", "assistant", "hi there"))
            .await
            .unwrap();

        let history = store.message_history("u", "cli", 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].role, "assistant");
    }

    #[tokio::test]
    async fn file_store_skips_corrupt_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().to_path_buf());
        store.init().await.unwrap();
        store
            .append_message(StoredMessage::new("u", "cli", "user", "ok"))
            .await
            .unwrap();
        std::fs::write(
            dir.path().join("messages.jsonl"),
            format!(
                "{}\nnot json\n",
                serde_json::to_string(&StoredMessage::new("u", "cli", "user", "ok")).unwrap()
            ),
        )
        .unwrap();

        let history = store.message_history("u", "cli", 10).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn usage_batch_and_window_query() {
        let store = InMemoryStore::new();
        store
            .append_usage_batch(&[usage("u", 0.01), usage("u", 0.02), usage("other", 0.5)])
            .await
            .unwrap();

        let since = chrono::Utc::now() - chrono::Duration::hours(1);
        let rows = store.usage_since("u", since).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn history_limit_keeps_newest() {
        let store = InMemoryStore::new();
        for i in 0..5 {
            store
                .append_message(StoredMessage::new("u", "cli", "user", &format!("m{i}")))
                .await
                .unwrap();
        }
        let history = store.message_history("u", "cli", 2).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "m3");
        assert_eq!(history[1].content, "m4");
    }
}
