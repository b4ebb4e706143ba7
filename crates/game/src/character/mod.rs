mod config;
mod entity;
mod locomotion;
mod role;

pub use config::CharacterConfig;
pub use entity::Character;
pub use locomotion::{Locomotion, LocomotionConfig, MovementParams};
pub use role::Role;
