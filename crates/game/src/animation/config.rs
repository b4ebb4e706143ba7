use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ensure_positive, ensure_range};
use crate::math::ResponseCurve;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IkConfig {
    pub enable_ik: bool,
    pub min_target_dir_angle: f32,
    pub max_target_dir_angle: f32,
    pub min_arms_angle: f32,
    pub max_arms_angle: f32,
    pub arms_angle_offset: f32,
    pub hands_rotation_offset: f32,
    pub arms_horizontal_separation: f32,
    /// Distance from the chest to the midpoint between the hands, by vertical-aim percent.
    pub arms_distance: ResponseCurve,
    pub look_distance: f32,
    /// Share of the look rotation taken by the neck; the head takes the rest.
    pub neck_look_share: f32,
}

impl Default for IkConfig {
    fn default() -> Self {
        Self {
            enable_ik: true,
            min_target_dir_angle: -30.0,
            max_target_dir_angle: 60.0,
            min_arms_angle: -70.0,
            max_arms_angle: 100.0,
            arms_angle_offset: 0.0,
            hands_rotation_offset: 0.0,
            arms_horizontal_separation: 0.75,
            arms_distance: ResponseCurve::new(vec![(0.0, 0.45), (0.5, 0.55), (1.0, 0.5)]),
            look_distance: 5.0,
            neck_look_share: 0.4,
        }
    }
}

impl IkConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_range(
            "target_dir_angle",
            self.min_target_dir_angle,
            self.max_target_dir_angle,
        )?;
        ensure_range("arms_angle", self.min_arms_angle, self.max_arms_angle)?;
        ensure_positive("look_distance", self.look_distance)?;
        if self.min_target_dir_angle == self.max_target_dir_angle {
            return Err(ConfigError::NotPositive {
                field: "target_dir_angle span",
                value: 0.0,
            });
        }
        if self.arms_distance.keys().is_empty() {
            return Err(ConfigError::EmptyCurve("arms_distance"));
        }
        Ok(())
    }
}
