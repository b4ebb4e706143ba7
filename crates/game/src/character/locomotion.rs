use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ensure_positive};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocomotionConfig {
    /// Horizontal speed cap in m/s at full forward input.
    pub movement_speed: f32,
    pub backward_speed_multiplier: f32,
    pub movement_force: f32,
}

impl Default for LocomotionConfig {
    fn default() -> Self {
        Self {
            movement_speed: 5.0,
            backward_speed_multiplier: 0.75,
            movement_force: 1000.0,
        }
    }
}

impl LocomotionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("locomotion.movement_speed", self.movement_speed)?;
        ensure_positive(
            "locomotion.backward_speed_multiplier",
            self.backward_speed_multiplier,
        )?;
        ensure_positive("locomotion.movement_force", self.movement_force)
    }
}

/// Animator movement parameters derived from the latest move input.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MovementParams {
    pub moving: bool,
    pub speed: f32,
    pub forward_speed: f32,
}

/// Turns the latest move input into a horizontal velocity target and the force
/// that chases it.
#[derive(Debug, Clone)]
pub struct Locomotion {
    config: LocomotionConfig,
    target_velocity: Vec3,
    params: MovementParams,
}

impl Locomotion {
    pub fn new(config: LocomotionConfig) -> Self {
        Self {
            config,
            target_velocity: Vec3::ZERO,
            params: MovementParams::default(),
        }
    }

    pub fn config(&self) -> &LocomotionConfig {
        &self.config
    }

    pub fn target_velocity(&self) -> Vec3 {
        self.target_velocity
    }

    pub fn params(&self) -> MovementParams {
        self.params
    }

    /// `facing` is the floor-projected aim. Movement off the floor is discarded.
    pub fn set_input(&mut self, movement: Vec2, facing: Vec3, enabled: bool) -> MovementParams {
        if !enabled || !movement.is_finite() || movement == Vec2::ZERO || facing == Vec3::ZERO {
            self.target_velocity = Vec3::ZERO;
            self.params = MovementParams::default();
            return self.params;
        }

        // Sideways-only input has no forward component and brakes to a stop.
        let forward = movement.y.clamp(-1.0, 1.0);
        let multiplier = if forward < 0.0 {
            self.config.backward_speed_multiplier
        } else {
            1.0
        };
        self.target_velocity = facing * forward * self.config.movement_speed * multiplier;
        self.params = MovementParams {
            moving: true,
            speed: forward.abs(),
            forward_speed: forward,
        };
        self.params
    }

    pub fn stop(&mut self) {
        self.target_velocity = Vec3::ZERO;
        self.params = MovementParams::default();
    }

    /// Acceleration towards the target velocity, horizontal only.
    pub fn acceleration(&self, current_velocity: Vec3, dt: f32) -> Vec3 {
        if !self.params.moving {
            return Vec3::ZERO;
        }
        let mut change = self.target_velocity - current_velocity;
        change.y = 0.0;
        change * self.config.movement_force * dt
    }
}
