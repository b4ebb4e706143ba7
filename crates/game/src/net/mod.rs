mod connection;
mod endpoint;
mod protocol;
mod simulator;
mod stats;

pub use connection::{ChallengeOutcome, ClientConnection, ConnectionManager, ConnectionState};
pub use endpoint::NetworkEndpoint;
pub use protocol::{
    DEFAULT_PORT, DEFAULT_TICK_RATE, MAX_PACKET_SIZE, PROTOCOL_MAGIC,
    PROTOCOL_VERSION, Packet, PacketError, PacketHeader, PacketType, SessionMessage, decode_pose,
    decode_rotation, encode_rotation,
};
pub use simulator::{NetworkSimulator, Outcome};
pub use stats::{NetworkStats, PacketLossSimulation, rand_u64};
