//! The agent runtime: the message pipeline, the supervisor, the
//! proactive loop, inbound dispatch, telemetry, and the shared worker
//! pool.

pub mod critic;
pub mod dag;
pub mod dynamic;
pub mod heartbeat;
pub mod inbound;
pub mod loop_detect;
pub mod pipeline;
pub mod supervisor;
pub mod triggers;
pub mod usage;
pub mod voi;
pub mod workers;

pub use inbound::InboundDispatcher;
pub use pipeline::{run_turn, TurnOutcome, TurnRequest};
pub use supervisor::supervise;
