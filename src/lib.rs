// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod error;
pub mod flavor;
pub mod puzzle;
pub mod registry;
pub mod reveal;
pub mod store;

pub use error::{GameError, Result};

/// Opaque stable channel identifier supplied by the chat platform layer.
pub type ChannelId = u64;
/// Opaque stable participant identifier supplied by the chat platform layer.
pub type PlayerId = u64;

/// Nominal interval between expiry sweeps, owned by the external scheduler.
pub const SWEEP_INTERVAL_SECS: u64 = 60;
