use serde::{Deserialize, Serialize};

use crate::character::Role;

use super::config::PhysicsConfig;

/// Simulation parameters for one character's bodies. Only the authority ever
/// simulates; every other process drives kinematic copies with collisions off.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsState {
    pub kinematic: bool,
    pub detect_collisions: bool,
    pub solver_iterations: usize,
    pub velocity_iterations: usize,
    pub max_angular_velocity: f32,
}

impl PhysicsState {
    pub fn for_role(role: Role, config: &PhysicsConfig) -> Self {
        let simulated = role.is_authority();
        Self {
            kinematic: !simulated,
            detect_collisions: simulated,
            solver_iterations: config.solver_iterations,
            velocity_iterations: config.velocity_iterations,
            max_angular_velocity: config.max_angular_velocity,
        }
    }

    pub fn is_simulated(&self) -> bool {
        !self.kinematic
    }
}
