mod config;
mod ragdoll;
mod state;
mod world;

pub use config::{JointDrive, PhysicsConfig};
pub use ragdoll::Ragdoll;
pub use state::PhysicsState;
pub use world::{PhysicsWorld, RayHit};
