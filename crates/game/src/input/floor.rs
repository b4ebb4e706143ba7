use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ensure_positive};
use crate::math::angle_between_deg;

/// Process that runs the floor sensor for a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SensorSite {
    /// The owning connection probes its local copy and forwards changes to the host.
    #[default]
    Owner,
    /// The host probes the authoritative bodies directly.
    Authority,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloorSensorConfig {
    pub detection_distance: f32,
    pub max_slope: f32,
    pub site: SensorSite,
}

impl Default for FloorSensorConfig {
    fn default() -> Self {
        Self {
            detection_distance: 0.3,
            max_slope: 60.0,
            site: SensorSite::Owner,
        }
    }
}

impl FloorSensorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("detection_distance", self.detection_distance)?;
        ensure_positive("max_slope", self.max_slope)
    }
}

/// Downward ray hit below a foot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloorHit {
    pub distance: f32,
    pub normal: Vec3,
}

/// Edge detector over per-foot floor probes. Either foot on the floor counts.
#[derive(Debug, Clone)]
pub struct FloorSensor {
    config: FloorSensorConfig,
    on_floor: bool,
}

impl FloorSensor {
    pub fn new(config: FloorSensorConfig) -> Self {
        Self {
            config,
            on_floor: true,
        }
    }

    pub fn config(&self) -> &FloorSensorConfig {
        &self.config
    }

    pub fn is_on_floor(&self) -> bool {
        self.on_floor
    }

    pub fn foot_on_floor(&self, hit: Option<FloorHit>) -> bool {
        hit.is_some_and(|hit| {
            hit.distance <= self.config.detection_distance
                && angle_between_deg(hit.normal, Vec3::Y) <= self.config.max_slope
        })
    }

    /// Returns the new contact state when it changed.
    pub fn update(&mut self, left: Option<FloorHit>, right: Option<FloorHit>) -> Option<bool> {
        let on_floor = self.foot_on_floor(right) || self.foot_on_floor(left);
        if on_floor == self.on_floor {
            return None;
        }
        self.on_floor = on_floor;
        Some(on_floor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(distance: f32) -> Option<FloorHit> {
        Some(FloorHit {
            distance,
            normal: Vec3::Y,
        })
    }

    #[test]
    fn starts_on_floor_and_reports_only_changes() {
        let mut sensor = FloorSensor::new(FloorSensorConfig::default());
        assert!(sensor.is_on_floor());
        assert_eq!(sensor.update(flat(0.1), None), None);
        assert_eq!(sensor.update(None, None), Some(false));
        assert_eq!(sensor.update(None, None), None);
        assert_eq!(sensor.update(None, flat(0.05)), Some(true));
    }

    #[test]
    fn distant_hit_is_airborne() {
        let mut sensor = FloorSensor::new(FloorSensorConfig::default());
        assert_eq!(sensor.update(flat(0.5), flat(0.31)), Some(false));
    }

    #[test]
    fn steep_slope_is_not_floor() {
        let sensor = FloorSensor::new(FloorSensorConfig::default());
        let steep = Some(FloorHit {
            distance: 0.1,
            normal: Vec3::new(1.0, 0.3, 0.0).normalize(),
        });
        let gentle = Some(FloorHit {
            distance: 0.1,
            normal: Vec3::new(1.0, 1.0, 0.0).normalize(),
        });
        assert!(!sensor.foot_on_floor(steep));
        assert!(sensor.foot_on_floor(gentle));
    }
}
