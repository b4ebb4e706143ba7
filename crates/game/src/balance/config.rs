use serde::{Deserialize, Serialize};

use super::BalanceMode;
use crate::error::{ConfigError, ensure_positive};
use crate::math::ResponseCurve;
use crate::physics::JointDrive;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceConfig {
    pub initial_mode: BalanceMode,
    pub angular_drag: f32,
    pub upright_torque: f32,
    /// Maps inclination percent in `[0, 1]` to the share of `upright_torque` applied.
    pub upright_torque_curve: ResponseCurve,
    pub rotation_torque: f32,
    pub manual_torque: f32,
    pub max_manual_rotation_speed: f32,
    pub stabilizer_drive: JointDrive,
    pub freeze_rotation_speed: f32,
    pub on_floor_strength: f32,
    pub airborne_head_neck_strength: f32,
    pub airborne_leg_strength: f32,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            initial_mode: BalanceMode::StabilizerJoint,
            angular_drag: 0.05,
            upright_torque: 10000.0,
            upright_torque_curve: ResponseCurve::new(vec![(0.0, 0.0), (0.3, 0.6), (1.0, 1.0)]),
            rotation_torque: 500.0,
            manual_torque: 500.0,
            max_manual_rotation_speed: 5.0,
            stabilizer_drive: JointDrive::new(2000.0, 200.0, 10000.0),
            freeze_rotation_speed: 5.0,
            on_floor_strength: 1.0,
            airborne_head_neck_strength: 0.1,
            airborne_leg_strength: 0.05,
        }
    }
}

impl BalanceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("max_manual_rotation_speed", self.max_manual_rotation_speed)?;
        ensure_positive("freeze_rotation_speed", self.freeze_rotation_speed)?;
        if self.angular_drag < 0.0 {
            return Err(ConfigError::NotPositive {
                field: "angular_drag",
                value: self.angular_drag,
            });
        }
        if self.upright_torque_curve.keys().is_empty() {
            return Err(ConfigError::EmptyCurve("upright_torque_curve"));
        }
        Ok(())
    }
}
