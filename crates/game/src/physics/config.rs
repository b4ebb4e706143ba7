use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ensure_positive};

/// Angular drive applied by a joint motor towards its target rotation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointDrive {
    pub stiffness: f32,
    pub damping: f32,
    pub max_force: f32,
}

impl JointDrive {
    pub const ZERO: Self = Self {
        stiffness: 0.0,
        damping: 0.0,
        max_force: 0.0,
    };

    pub fn new(stiffness: f32, damping: f32, max_force: f32) -> Self {
        Self {
            stiffness,
            damping,
            max_force,
        }
    }

    /// Stiffness and damping scale with `strength`; the force ceiling does not.
    pub fn scaled(&self, strength: f32) -> Self {
        Self {
            stiffness: self.stiffness * strength,
            damping: self.damping * strength,
            max_force: self.max_force,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.stiffness == 0.0 && self.damping == 0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsConfig {
    pub gravity: f32,
    pub solver_iterations: usize,
    pub velocity_iterations: usize,
    pub max_angular_velocity: f32,
    pub joint_drive: JointDrive,
    pub ground_half_size: f32,
    pub friction: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: -9.81,
            solver_iterations: 12,
            velocity_iterations: 4,
            max_angular_velocity: 50.0,
            joint_drive: JointDrive::new(600.0, 40.0, 2000.0),
            ground_half_size: 50.0,
            friction: 0.8,
        }
    }
}

impl PhysicsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("max_angular_velocity", self.max_angular_velocity)?;
        ensure_positive("ground_half_size", self.ground_half_size)?;
        if self.solver_iterations == 0 {
            return Err(ConfigError::NotPositive {
                field: "solver_iterations",
                value: 0.0,
            });
        }
        Ok(())
    }
}
