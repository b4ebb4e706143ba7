mod identity;
mod loopback;
mod transport;

pub use identity::{IdentityRegistry, PlayerIdentity};
pub use loopback::LoopbackNetwork;
pub use transport::{Envelope, Outbox, Recipient, SessionTransport};

pub type ConnectionId = u32;
pub type CharacterId = u32;

/// Connection id of the authoritative host process.
pub const HOST_CONNECTION: ConnectionId = 0;
