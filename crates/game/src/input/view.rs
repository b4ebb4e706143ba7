use glam::{Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::math::forward;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    pub look_sensitivity: f32,
    /// Degrees per second of keyboard turning.
    pub keyboard_rotation_speed: f32,
    pub invert_x: bool,
    pub invert_y: bool,
    pub min_vertical_angle: f32,
    pub max_vertical_angle: f32,
    /// How far the view may turn from the body before the body follows.
    pub max_horizontal_angle: f32,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            look_sensitivity: 2.0,
            keyboard_rotation_speed: 90.0,
            invert_x: false,
            invert_y: false,
            min_vertical_angle: -85.0,
            max_vertical_angle: 85.0,
            max_horizontal_angle: 90.0,
        }
    }
}

/// First-person view on the owning client. Angles are in degrees; positive yaw turns
/// right and positive pitch looks down.
#[derive(Debug, Clone, Default)]
pub struct FirstPersonView {
    config: ViewConfig,
    yaw: f32,
    pitch: f32,
    body_yaw: f32,
}

impl FirstPersonView {
    pub fn new(config: ViewConfig) -> Self {
        Self {
            config,
            yaw: 0.0,
            pitch: 0.0,
            body_yaw: 0.0,
        }
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn body_yaw(&self) -> f32 {
        self.body_yaw
    }

    pub fn update(&mut self, look_delta: Vec2, turn: f32, dt: f32) {
        let cfg = &self.config;
        let sign_x = if cfg.invert_x { -1.0 } else { 1.0 };
        let sign_y = if cfg.invert_y { -1.0 } else { 1.0 };

        self.yaw += look_delta.x * cfg.look_sensitivity * sign_x
            + turn * cfg.keyboard_rotation_speed * dt;
        self.pitch -= look_delta.y * cfg.look_sensitivity * sign_y;
        self.pitch = self
            .pitch
            .clamp(cfg.min_vertical_angle, cfg.max_vertical_angle);

        let limit = cfg.max_horizontal_angle;
        if self.yaw > limit {
            self.body_yaw += self.yaw - limit;
            self.yaw = limit;
        } else if self.yaw < -limit {
            self.body_yaw += self.yaw + limit;
            self.yaw = -limit;
        }
    }

    pub fn rotation(&self) -> Quat {
        let total_yaw = (self.body_yaw + self.yaw).to_radians();
        Quat::from_rotation_y(-total_yaw) * Quat::from_rotation_x(self.pitch.to_radians())
    }

    pub fn aim_direction(&self) -> Vec3 {
        forward(self.rotation())
    }
}
