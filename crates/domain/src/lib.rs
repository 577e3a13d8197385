//! Shared foundation for all Orion crates: the common error type, the
//! layered configuration tree, chat message types, the typed event bus,
//! and structured trace events.

pub mod chat;
pub mod config;
pub mod error;
pub mod event;
pub mod trace;
