use serde::{Deserialize, Serialize};

use crate::animation::IkConfig;
use crate::balance::BalanceConfig;
use crate::error::ConfigError;
use crate::input::FloorSensorConfig;
use crate::physics::PhysicsConfig;
use crate::replication::ReplicationConfig;

use super::locomotion::LocomotionConfig;

/// Every tuning value of a character, shared by host and observers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CharacterConfig {
    pub balance: BalanceConfig,
    pub ik: IkConfig,
    pub locomotion: LocomotionConfig,
    pub replication: ReplicationConfig,
    pub floor: FloorSensorConfig,
    pub physics: PhysicsConfig,
}

impl CharacterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.balance.validate()?;
        self.ik.validate()?;
        self.locomotion.validate()?;
        self.replication.validate()?;
        self.floor.validate()?;
        self.physics.validate()
    }
}
