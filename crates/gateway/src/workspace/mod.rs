//! Bootstrap file set and system-prompt assembly.

pub mod context;
pub mod files;

pub use context::{ContextBuilder, SessionMode};
pub use files::WorkspaceReader;
