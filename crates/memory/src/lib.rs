//! Memory subsystem: embedding, two-phase adaptive retrieval with
//! reinforcement feedback, the hierarchical temporal index, the causal
//! graph, and user profiles.

pub mod ann;
pub mod causal;
pub mod embed;
pub mod profile;
pub mod store;
pub mod temporal;
pub mod types;

pub use ann::{AnnIndex, InMemoryAnnIndex};
pub use embed::{Embedder, EmbedderChain, HashEmbedder};
pub use store::{MemoryStore, SaveOptions};
pub use types::{MemoryContext, MemoryEntry, SearchHit, TaskFeedback};
