use glam::{Quat, Vec2, Vec3};
use rkyv::{Archive, Deserialize, Serialize, rancor};

use crate::animation::ArmSide;
use crate::replication::PoseSnapshot;
use crate::session::{CharacterId, ConnectionId};

pub const MAX_PACKET_SIZE: usize = 1200;
pub const PROTOCOL_VERSION: u32 = 1;
pub const PROTOCOL_MAGIC: u32 = 0x4252_4B46;
pub const DEFAULT_PORT: u16 = 27015;
pub const DEFAULT_TICK_RATE: u32 = 60;

const ROTATION_SCALE: f32 = 32767.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub struct PacketHeader {
    pub magic: u32,
    pub version: u32,
    pub sequence: u32,
}

impl PacketHeader {
    pub fn new(sequence: u32) -> Self {
        Self {
            magic: PROTOCOL_MAGIC,
            version: PROTOCOL_VERSION,
            sequence,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == PROTOCOL_MAGIC && self.version == PROTOCOL_VERSION
    }
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum PacketType {
    ConnectionRequest {
        client_salt: u64,
        name: String,
    },
    ConnectionChallenge {
        server_salt: u64,
        challenge: u64,
    },
    ChallengeResponse {
        combined_salt: u64,
    },
    ConnectionAccepted {
        client_id: ConnectionId,
        character_id: CharacterId,
    },
    ConnectionDenied {
        reason: String,
    },
    Session(SessionMessage),
    Ping {
        timestamp: u64,
    },
    Pong {
        timestamp: u64,
    },
    Disconnect,
}

/// Messages exchanged between the authority and observers once a connection is up.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum SessionMessage {
    /// Sent by the owner every input frame, also when `movement` is zero.
    MoveInput {
        character: CharacterId,
        movement: [f32; 2],
        aim_direction: [f32; 3],
    },
    ArmWeight {
        character: CharacterId,
        side: ArmSide,
        weight: f32,
    },
    FloorChanged {
        character: CharacterId,
        on_floor: bool,
    },
    PoseSnapshot {
        character: CharacterId,
        positions: Vec<[f32; 3]>,
        rotations: Vec<[i16; 4]>,
        timestamp: f64,
    },
    AnimationEvent {
        character: CharacterId,
        clip: String,
        speed: f32,
    },
    MovementState {
        character: CharacterId,
        moving: bool,
        speed: f32,
        forward_speed: f32,
    },
    CharacterSpawned {
        character: CharacterId,
        owner: ConnectionId,
        name: String,
        position: [f32; 3],
    },
    CharacterDespawned {
        character: CharacterId,
    },
}

impl SessionMessage {
    pub fn character(&self) -> CharacterId {
        match self {
            Self::MoveInput { character, .. }
            | Self::ArmWeight { character, .. }
            | Self::FloorChanged { character, .. }
            | Self::PoseSnapshot { character, .. }
            | Self::AnimationEvent { character, .. }
            | Self::MovementState { character, .. }
            | Self::CharacterSpawned { character, .. }
            | Self::CharacterDespawned { character } => *character,
        }
    }

    pub fn move_input(character: CharacterId, movement: Vec2, aim_direction: Vec3) -> Self {
        Self::MoveInput {
            character,
            movement: movement.to_array(),
            aim_direction: aim_direction.to_array(),
        }
    }

    pub fn pose(character: CharacterId, snapshot: &PoseSnapshot) -> Self {
        Self::PoseSnapshot {
            character,
            positions: snapshot.positions.iter().map(|p| p.to_array()).collect(),
            rotations: snapshot.rotations.iter().copied().map(encode_rotation).collect(),
            timestamp: snapshot.timestamp,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::MoveInput { .. } => "MoveInput",
            Self::ArmWeight { .. } => "ArmWeight",
            Self::FloorChanged { .. } => "FloorChanged",
            Self::PoseSnapshot { .. } => "PoseSnapshot",
            Self::AnimationEvent { .. } => "AnimationEvent",
            Self::MovementState { .. } => "MovementState",
            Self::CharacterSpawned { .. } => "CharacterSpawned",
            Self::CharacterDespawned { .. } => "CharacterDespawned",
        }
    }
}

pub fn decode_pose(positions: &[[f32; 3]], rotations: &[[i16; 4]], timestamp: f64) -> PoseSnapshot {
    PoseSnapshot {
        positions: positions.iter().map(|&p| Vec3::from_array(p)).collect(),
        rotations: rotations.iter().copied().map(decode_rotation).collect(),
        timestamp,
    }
}

pub fn encode_rotation(rotation: Quat) -> [i16; 4] {
    let q = rotation.normalize().to_array();
    q.map(|c| (c.clamp(-1.0, 1.0) * ROTATION_SCALE).round() as i16)
}

pub fn decode_rotation(encoded: [i16; 4]) -> Quat {
    let [x, y, z, w] = encoded.map(|c| c as f32 / ROTATION_SCALE);
    let q = Quat::from_xyzw(x, y, z, w);
    if q.length_squared() > f32::EPSILON {
        q.normalize()
    } else {
        Quat::IDENTITY
    }
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: PacketType,
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
}

impl From<PacketError> for std::io::Error {
    fn from(err: PacketError) -> Self {
        std::io::Error::new(std::io::ErrorKind::InvalidData, err)
    }
}

impl Packet {
    pub fn new(header: PacketHeader, payload: PacketType) -> Self {
        Self { header, payload }
    }

    pub fn session(sequence: u32, message: SessionMessage) -> Self {
        Self::new(PacketHeader::new(sequence), PacketType::Session(message))
    }

    pub fn serialize(&self) -> Result<Vec<u8>, PacketError> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(PacketError::Serialize)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, PacketError> {
        rkyv::from_bytes::<Self, rancor::Error>(data).map_err(PacketError::Deserialize)
    }
}
