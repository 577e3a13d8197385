//! Typed in-process event bus.
//!
//! Every event is a [`BusEvent`] variant — there are no ad-hoc payloads.
//! Publishing never blocks; slow subscribers observe a lag error from the
//! underlying broadcast channel and simply miss the dropped events.

use serde::Serialize;
use tokio::sync::broadcast;

/// Default capacity of the broadcast ring. Subscribers that fall more
/// than this many events behind lose the oldest ones.
const DEFAULT_CAPACITY: usize = 256;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// BusEvent
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The sum type of everything that can be published on the bus.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BusEvent {
    /// An inbound message was accepted from a transport.
    InboundMessage {
        user_id: String,
        channel_id: String,
        chars: usize,
    },

    /// A proactive-loop tick started.
    Heartbeat {
        tick: u64,
        interval_secs: u64,
    },

    /// A trigger rule was evaluated; `acted_on` records the VoI decision.
    TriggerFired {
        rule: String,
        user_id: String,
        voi: f64,
        acted_on: bool,
    },

    /// A reply left the host through a transport.
    ReplySent {
        user_id: String,
        channel_id: String,
        chars: usize,
    },

    /// An engine crossed a health-status boundary.
    EngineStatusChanged {
        engine: String,
        from: String,
        to: String,
    },

    /// Level-0 memories were folded into a higher-level summary.
    MemoryCompressed {
        user_id: String,
        sources: usize,
        level: u8,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// EventBus
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Cloneable publish/subscribe handle. All clones share one channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BusEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event. Returns the number of subscribers that will see
    /// it; zero subscribers is not an error.
    pub fn publish(&self, event: BusEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
