//! Agent Control Protocol — the signed, typed message bus between
//! in-process agents.
//!
//! Every message carries an HMAC-SHA256 signature and a conversation
//! state; the router verifies the signature, enforces the state graph,
//! and bounds handler execution with a wall-clock timeout. Failures are
//! typed error responses, never panics.

pub mod message;
pub mod router;
pub mod state;

pub use message::{AcpMessage, AcpMessageType};
pub use router::{AcpHandler, AcpRouter};
pub use state::AcpState;
