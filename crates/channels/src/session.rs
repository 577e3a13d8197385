//! Session tracking, owned by the transport manager.
//!
//! A session is `(user_id, channel_id)`: created lazily on the first
//! event, holding a rolling message window and the last-activity
//! timestamp, evicted after the idle threshold.

use std::collections::{HashMap, VecDeque};

use parking_lot::RwLock;

use orion_domain::chat::ChatMessage;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub channel_id: String,
    pub window: VecDeque<ChatMessage>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_activity: chrono::DateTime<chrono::Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SessionStore
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SessionStore {
    sessions: RwLock<HashMap<(String, String), Session>>,
    window_size: usize,
    idle_secs: i64,
}

impl SessionStore {
    pub fn new(window_size: usize, idle_secs: u64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            window_size: window_size.max(1),
            idle_secs: idle_secs as i64,
        }
    }

    /// Create-or-touch a session, bumping last activity.
    pub fn touch(&self, user_id: &str, channel_id: &str) {
        let now = chrono::Utc::now();
        let mut sessions = self.sessions.write();
        sessions
            .entry((user_id.to_string(), channel_id.to_string()))
            .and_modify(|s| s.last_activity = now)
            .or_insert_with(|| Session {
                user_id: user_id.to_string(),
                channel_id: channel_id.to_string(),
                window: VecDeque::new(),
                created_at: now,
                last_activity: now,
            });
    }

    /// Append a message to the rolling window (creates the session).
    pub fn append(&self, user_id: &str, channel_id: &str, message: ChatMessage) {
        let now = chrono::Utc::now();
        let mut sessions = self.sessions.write();
        let session = sessions
            .entry((user_id.to_string(), channel_id.to_string()))
            .or_insert_with(|| Session {
                user_id: user_id.to_string(),
                channel_id: channel_id.to_string(),
                window: VecDeque::new(),
                created_at: now,
                last_activity: now,
            });
        session.last_activity = now;
        if session.window.len() >= self.window_size {
            session.window.pop_front();
        }
        session.window.push_back(message);
    }

    pub fn window(&self, user_id: &str, channel_id: &str) -> Vec<ChatMessage> {
        self.sessions
            .read()
            .get(&(user_id.to_string(), channel_id.to_string()))
            .map(|s| s.window.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Most recent activity across all of a user's sessions.
    pub fn last_activity(&self, user_id: &str) -> Option<chrono::DateTime<chrono::Utc>> {
        self.sessions
            .read()
            .values()
            .filter(|s| s.user_id == user_id)
            .map(|s| s.last_activity)
            .max()
    }

    /// Per-channel last-activity rows for one user (heartbeat context).
    pub fn channel_activity(&self, user_id: &str) -> Vec<(String, chrono::DateTime<chrono::Utc>)> {
        self.sessions
            .read()
            .values()
            .filter(|s| s.user_id == user_id)
            .map(|s| (s.channel_id.clone(), s.last_activity))
            .collect()
    }

    pub fn user_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .sessions
            .read()
            .values()
            .map(|s| s.user_id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Drop sessions idle past the threshold; returns how many.
    pub fn evict_idle(&self) -> usize {
        let cutoff = chrono::Utc::now() - chrono::Duration::seconds(self.idle_secs);
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| s.last_activity >= cutoff);
        before - sessions.len()
    }
}
