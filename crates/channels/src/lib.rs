//! Transport layer: the [`Channel`] adapter contract, the priority
//! fan-out manager, lazy session tracking, and device pairing.

pub mod manager;
pub mod pairing;
pub mod session;
pub mod traits;

pub use manager::ChannelManager;
pub use pairing::{DeviceToken, PairingStore};
pub use session::{Session, SessionStore};
pub use traits::Channel;
