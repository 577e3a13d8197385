use serde::Serialize;

/// Structured trace events emitted across all Orion crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    ContextBuilt {
        total_injected_chars: usize,
        files_included: usize,
        files_truncated: usize,
        checksum_failures: usize,
        memories_injected: usize,
    },
    EngineCall {
        engine: String,
        task_type: String,
        duration_ms: u64,
        success: bool,
    },
    EngineStatusFlip {
        engine: String,
        from: String,
        to: String,
    },
    MemorySaved {
        user_id: String,
        memory_id: String,
        level: Option<u8>,
    },
    MemoryFeedback {
        user_id: String,
        updated: usize,
        reward: f64,
    },
    SecurityBlocked {
        stage: String,
        reason: String,
    },
    TurnCompleted {
        user_id: String,
        channel_id: String,
        duration_ms: u64,
        retrieved_memories: usize,
    },
    SupervisorWave {
        wave: usize,
        nodes: usize,
    },
    LoopBreak {
        pattern: String,
        tool: String,
    },
    HeartbeatTick {
        tick: u64,
        candidates: usize,
        sent: usize,
    },
    AcpRouted {
        from: String,
        to: String,
        action: String,
        outcome: String,
    },
    PairingConfirmed {
        user_id: String,
        channel: String,
    },
    UsageFlush {
        records: usize,
        requeued: usize,
    },
    ChannelSend {
        channel: String,
        user_id: String,
        delivered: bool,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "orion_event");
    }
}
