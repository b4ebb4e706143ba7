pub mod animation;
pub mod balance;
pub mod body;
pub mod character;
pub mod error;
pub mod input;
pub mod math;
pub mod net;
pub mod physics;
pub mod replication;
pub mod session;
pub mod simulation;
pub mod skeleton;

pub use animation::{Animator, ArmSide, IkBlender, IkConfig, JointTargets};
pub use balance::{BalanceConfig, BalanceController, BalanceMode, TorsoCommand, TorsoState};
pub use body::{BodyPart, BodyPartRegistry};
pub use character::{Character, CharacterConfig, Locomotion, LocomotionConfig, Role};
pub use error::{ConfigError, SessionError};
pub use input::{FirstPersonView, FloorSensor, InputEvent, InputRouter, ViewConfig};
pub use net::{
    ChallengeOutcome, ClientConnection, ConnectionManager, ConnectionState, DEFAULT_PORT,
    DEFAULT_TICK_RATE, NetworkEndpoint, NetworkSimulator, NetworkStats, Packet, PacketError,
    PacketHeader, PacketLossSimulation, PacketType, SessionMessage,
};
pub use physics::{JointDrive, PhysicsConfig, PhysicsWorld, Ragdoll};
pub use replication::{
    PoseInterpolator, PoseSnapshot, ReplicationConfig, SlotPolicy, SnapshotRing, SnapshotSampler,
};
pub use session::{
    CharacterId, ConnectionId, Envelope, HOST_CONNECTION, IdentityRegistry, LoopbackNetwork,
    Outbox, PlayerIdentity, Recipient, SessionTransport,
};
pub use simulation::{FixedTimestep, HostSimulation, ObserverSimulation};
pub use skeleton::{BoneId, BoneTransform, Skeleton};
