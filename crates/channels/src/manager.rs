//! Channel manager — registration, lifecycle, and priority fan-out.

use std::sync::Arc;

use parking_lot::RwLock;

use orion_domain::config::TransportConfig;
use orion_domain::trace::TraceEvent;

use crate::session::SessionStore;
use crate::traits::Channel;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ChannelManager
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ChannelManager {
    channels: RwLock<Vec<Arc<dyn Channel>>>,
    /// Outbound priority (channel ids, most preferred first).
    priority: Vec<String>,
    /// Sessions are owned here: transports are the only component that
    /// observes user activity directly.
    pub sessions: Arc<SessionStore>,
}

impl ChannelManager {
    pub fn new(cfg: &TransportConfig) -> Self {
        Self {
            channels: RwLock::new(Vec::new()),
            priority: cfg.priority.clone(),
            sessions: Arc::new(SessionStore::new(cfg.session_window, cfg.session_idle_secs)),
        }
    }

    /// Register an adapter. Registration order is the fallback priority
    /// for channels not named in the configured list.
    pub fn register(&self, channel: Arc<dyn Channel>) {
        tracing::info!(channel = %channel.id(), "registered channel adapter");
        self.channels.write().push(channel);
    }

    pub async fn start_all(&self) {
        let channels = self.channels.read().clone();
        for channel in channels {
            if let Err(e) = channel.start().await {
                tracing::warn!(channel = %channel.id(), error = %e, "channel failed to start");
            }
        }
    }

    pub async fn stop_all(&self) {
        let channels = self.channels.read().clone();
        for channel in channels {
            if let Err(e) = channel.stop().await {
                tracing::warn!(channel = %channel.id(), error = %e, "channel failed to stop");
            }
        }
    }

    /// Channels in effective priority order: configured list first,
    /// then the rest in registration order.
    fn ordered(&self) -> Vec<Arc<dyn Channel>> {
        let channels = self.channels.read();
        let mut ordered: Vec<Arc<dyn Channel>> = Vec::with_capacity(channels.len());
        for id in &self.priority {
            if let Some(c) = channels.iter().find(|c| c.id() == id.as_str()) {
                ordered.push(c.clone());
            }
        }
        for c in channels.iter() {
            if !self.priority.iter().any(|id| id.as_str() == c.id()) {
                ordered.push(c.clone());
            }
        }
        ordered
    }

    /// Deliver to the first connected channel that accepts the message.
    /// Returns the winning channel id.
    pub async fn send(&self, user_id: &str, text: &str) -> Option<String> {
        for channel in self.ordered() {
            if !channel.is_connected() {
                continue;
            }
            match channel.send(user_id, text).await {
                Ok(true) => {
                    TraceEvent::ChannelSend {
                        channel: channel.id().into(),
                        user_id: user_id.into(),
                        delivered: true,
                    }
                    .emit();
                    return Some(channel.id().to_string());
                }
                Ok(false) => {
                    tracing::debug!(channel = %channel.id(), "channel declined message, trying next");
                }
                Err(e) => {
                    tracing::warn!(channel = %channel.id(), error = %e, "channel send failed, trying next");
                }
            }
        }
        TraceEvent::ChannelSend {
            channel: "none".into(),
            user_id: user_id.into(),
            delivered: false,
        }
        .emit();
        None
    }

    /// Ask for explicit approval through the first connected channel.
    pub async fn send_with_confirm(&self, user_id: &str, text: &str, prompt: &str) -> bool {
        for channel in self.ordered() {
            if !channel.is_connected() {
                continue;
            }
            match channel.send_with_confirm(user_id, text, prompt).await {
                Ok(approved) => return approved,
                Err(e) => {
                    tracing::warn!(channel = %channel.id(), error = %e, "confirm send failed, trying next");
                }
            }
        }
        false
    }

    /// Deliver to every connected channel; returns how many accepted.
    pub async fn broadcast(&self, user_id: &str, text: &str) -> usize {
        let mut delivered = 0;
        for channel in self.ordered() {
            if !channel.is_connected() {
                continue;
            }
            if matches!(channel.send(user_id, text).await, Ok(true)) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Ids of currently connected channels.
    pub fn connected(&self) -> Vec<String> {
        self.channels
            .read()
            .iter()
            .filter(|c| c.is_connected())
            .map(|c| c.id().to_string())
            .collect()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orion_domain::error::Result;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FakeChannel {
        id: String,
        connected: AtomicBool,
        accepts: bool,
        sent: AtomicUsize,
    }

    impl FakeChannel {
        fn new(id: &str, connected: bool, accepts: bool) -> Arc<Self> {
            Arc::new(Self {
                id: id.into(),
                connected: AtomicBool::new(connected),
                accepts,
                sent: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl Channel for FakeChannel {
        fn id(&self) -> &str {
            &self.id
        }
        async fn start(&self) -> Result<()> {
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }
        async fn stop(&self) -> Result<()> {
            self.connected.store(false, Ordering::SeqCst);
            Ok(())
        }
        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
        async fn send(&self, _user_id: &str, _text: &str) -> Result<bool> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(self.accepts)
        }
        async fn send_with_confirm(&self, _u: &str, _t: &str, _p: &str) -> Result<bool> {
            Ok(self.accepts)
        }
    }

    fn manager(priority: &[&str]) -> ChannelManager {
        let cfg = TransportConfig {
            priority: priority.iter().map(|s| s.to_string()).collect(),
            ..TransportConfig::default()
        };
        ChannelManager::new(&cfg)
    }

    #[tokio::test]
    async fn priority_order_first_connected_wins() {
        let mgr = manager(&["primary", "secondary"]);
        let primary = FakeChannel::new("primary", false, true);
        let secondary = FakeChannel::new("secondary", true, true);
        mgr.register(primary.clone());
        mgr.register(secondary.clone());

        let winner = mgr.send("u", "hello").await;
        assert_eq!(winner.as_deref(), Some("secondary"));
        assert_eq!(primary.sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn declined_send_falls_through() {
        let mgr = manager(&["a", "b"]);
        let a = FakeChannel::new("a", true, false);
        let b = FakeChannel::new("b", true, true);
        mgr.register(a.clone());
        mgr.register(b.clone());

        let winner = mgr.send("u", "hello").await;
        assert_eq!(winner.as_deref(), Some("b"));
        assert_eq!(a.sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn nothing_connected_returns_none() {
        let mgr = manager(&[]);
        mgr.register(FakeChannel::new("a", false, true));
        assert!(mgr.send("u", "hello").await.is_none());
    }

    #[tokio::test]
    async fn broadcast_counts_acceptors() {
        let mgr = manager(&[]);
        mgr.register(FakeChannel::new("a", true, true));
        mgr.register(FakeChannel::new("b", true, true));
        mgr.register(FakeChannel::new("c", false, true));
        assert_eq!(mgr.broadcast("u", "announcement").await, 2);
    }

    #[tokio::test]
    async fn confirm_send_reports_user_decision() {
        let mgr = manager(&[]);
        mgr.register(FakeChannel::new("approver", true, true));
        assert!(mgr.send_with_confirm("u", "do it?", "confirm").await);

        let mgr = manager(&[]);
        mgr.register(FakeChannel::new("denier", true, false));
        assert!(!mgr.send_with_confirm("u", "do it?", "confirm").await);
    }

    #[tokio::test]
    async fn unlisted_channels_follow_registration_order() {
        let mgr = manager(&["listed"]);
        mgr.register(FakeChannel::new("stray", true, true));
        mgr.register(FakeChannel::new("listed", true, true));
        let winner = mgr.send("u", "x").await;
        assert_eq!(winner.as_deref(), Some("listed"));
    }
}
