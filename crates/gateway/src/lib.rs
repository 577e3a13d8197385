//! The Orion host: state wiring, the per-turn message pipeline, the
//! supervisor, the proactive loop, usage telemetry, bootstrap context,
//! and the loopback HTTP + WebSocket API.

pub mod api;
pub mod runtime;
pub mod state;
pub mod workspace;
