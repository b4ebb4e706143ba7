use glam::{Quat, Vec2, Vec3};

use super::{BalanceConfig, BalanceMode};
use crate::body::{BodyPartRegistry, HEAD_NECK, LEFT_LEG, RIGHT_LEG};
use crate::math::{angle_between_deg, forward, look_rotation, signed_angle_deg, up};
use crate::physics::JointDrive;
use crate::skeleton::BoneTransform;

/// Physical torso state read back from the simulation before a control step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TorsoState {
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
}

impl Default for TorsoState {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
        }
    }
}

/// Effects on the physical torso for one fixed tick. World-space throughout.
#[derive(Debug, Clone, PartialEq)]
pub struct TorsoCommand {
    pub torque: Vec3,
    pub force: Vec3,
    /// Angular velocity after drag.
    pub angular_velocity: Vec3,
    /// Rotation to move the torso to this tick.
    pub rotation: Option<Quat>,
    /// Pose the stabilizer proxy tracks this tick.
    pub stabilizer_target: Option<BoneTransform>,
    pub stabilizer_drive: JointDrive,
    pub lock_rotations: bool,
}

/// Quadratic drag that never reverses the velocity: the removed magnitude is
/// `min(k * |v|^2, |v|)`.
pub fn apply_angular_drag(velocity: Vec3, k: f32) -> Vec3 {
    let speed = velocity.length();
    if !speed.is_finite() || speed <= f32::EPSILON || k <= 0.0 {
        return velocity;
    }
    let reduction = k * speed * speed;
    if reduction >= speed {
        return Vec3::ZERO;
    }
    velocity * (1.0 - reduction / speed)
}

#[derive(Debug, Clone)]
pub struct BalanceController {
    config: BalanceConfig,
    authoritative: bool,
    mode: BalanceMode,
    target_direction: Vec3,
    target_rotation: Quat,
    torque_input: Vec2,
    stabilizer_drive: JointDrive,
    rotations_locked: bool,
}

impl BalanceController {
    pub fn new(config: BalanceConfig, authoritative: bool) -> Self {
        let mode = config.initial_mode;
        let mut controller = Self {
            config,
            authoritative,
            mode,
            target_direction: Vec3::Z,
            target_rotation: Quat::IDENTITY,
            torque_input: Vec2::ZERO,
            stabilizer_drive: JointDrive::ZERO,
            rotations_locked: false,
        };
        if authoritative {
            controller.update_target_rotation();
            controller.start(mode);
        }
        controller
    }

    pub fn config(&self) -> &BalanceConfig {
        &self.config
    }

    pub fn mode(&self) -> BalanceMode {
        self.mode
    }

    pub fn target_direction(&self) -> Vec3 {
        self.target_direction
    }

    pub fn target_rotation(&self) -> Quat {
        self.target_rotation
    }

    pub fn torque_input(&self) -> Vec2 {
        self.torque_input
    }

    pub fn stabilizer_drive(&self) -> JointDrive {
        self.stabilizer_drive
    }

    pub fn rotations_locked(&self) -> bool {
        self.rotations_locked
    }

    /// Switches the control law. Returns whether the mode changed.
    pub fn set_mode(&mut self, mode: BalanceMode) -> bool {
        if !self.authoritative {
            log::debug!("Ignoring balance mode change to {} off-authority", mode);
            return false;
        }
        if mode == self.mode {
            log::warn!(
                "Balance mode is already {}, no changes made",
                mode.as_str()
            );
            return false;
        }

        self.stop(self.mode);
        self.mode = mode;
        self.start(mode);
        true
    }

    pub fn set_target_direction(&mut self, direction: Vec3) {
        if !self.authoritative {
            return;
        }
        self.target_direction = if direction.is_finite() {
            direction
        } else {
            Vec3::ZERO
        };
    }

    pub fn set_manual_torque_input(&mut self, input: Vec2) {
        if !self.authoritative {
            return;
        }
        self.torque_input = if input.is_finite() { input } else { Vec2::ZERO };
    }

    /// Runs the active control law against `torso`. `None` off-authority.
    pub fn tick(&mut self, torso: &TorsoState, dt: f32) -> Option<TorsoCommand> {
        if !self.authoritative {
            return None;
        }

        self.update_target_rotation();
        let angular_velocity = apply_angular_drag(torso.angular_velocity, self.config.angular_drag);

        let mut command = TorsoCommand {
            torque: Vec3::ZERO,
            force: Vec3::ZERO,
            angular_velocity,
            rotation: None,
            stabilizer_target: None,
            stabilizer_drive: self.stabilizer_drive,
            lock_rotations: self.rotations_locked,
        };

        match self.mode {
            BalanceMode::UprightTorque => {
                let torso_up = up(torso.rotation).normalize_or_zero();
                let inclination = angle_between_deg(torso_up, Vec3::Y) / 180.0;
                let percent = self.config.upright_torque_curve.evaluate(inclination);

                if torso_up != Vec3::ZERO {
                    let align = Quat::from_rotation_arc(torso_up, Vec3::Y).normalize();
                    command.torque +=
                        Vec3::new(align.x, align.y, align.z) * self.config.upright_torque * percent;
                }

                let direction_percent =
                    signed_angle_deg(forward(torso.rotation), self.target_direction, Vec3::Y)
                        / 180.0;
                command.torque += torso.rotation
                    * Vec3::new(0.0, direction_percent * self.config.rotation_torque, 0.0);
            }
            BalanceMode::FreezeRotations => {
                let t = (dt * self.config.freeze_rotation_speed).clamp(0.0, 1.0);
                command.rotation = Some(torso.rotation.slerp(self.target_rotation, t).normalize());
            }
            BalanceMode::StabilizerJoint => {
                command.stabilizer_target =
                    Some(BoneTransform::new(torso.position, self.target_rotation));
            }
            BalanceMode::ManualTorque => {
                if torso.angular_velocity.length() < self.config.max_manual_rotation_speed {
                    let input = self.torque_input * self.config.manual_torque;
                    command.torque += torso.rotation * Vec3::new(input.y, 0.0, input.x);
                }
            }
            BalanceMode::None => {}
        }

        Some(command)
    }

    /// Floor contact transition: stabilize and stiffen on landing, loosen in the air.
    pub fn on_floor_changed(&mut self, on_floor: bool, body_parts: &mut BodyPartRegistry) {
        if !self.authoritative {
            return;
        }

        if on_floor {
            if self.mode != BalanceMode::StabilizerJoint {
                self.set_mode(BalanceMode::StabilizerJoint);
            }
            let strength = self.config.on_floor_strength;
            body_parts.set_strength(HEAD_NECK, strength);
            body_parts.set_strength(RIGHT_LEG, strength);
            body_parts.set_strength(LEFT_LEG, strength);
        } else {
            if self.mode != BalanceMode::ManualTorque {
                self.set_mode(BalanceMode::ManualTorque);
            }
            body_parts.set_strength(HEAD_NECK, self.config.airborne_head_neck_strength);
            body_parts.set_strength(RIGHT_LEG, self.config.airborne_leg_strength);
            body_parts.set_strength(LEFT_LEG, self.config.airborne_leg_strength);
        }
    }

    fn update_target_rotation(&mut self) {
        self.target_rotation = if self.target_direction == Vec3::ZERO {
            Quat::IDENTITY
        } else {
            look_rotation(self.target_direction, Vec3::Y)
        };
    }

    fn start(&mut self, mode: BalanceMode) {
        match mode {
            BalanceMode::FreezeRotations => self.rotations_locked = true,
            BalanceMode::StabilizerJoint => self.stabilizer_drive = self.config.stabilizer_drive,
            _ => {}
        }
    }

    fn stop(&mut self, mode: BalanceMode) {
        match mode {
            BalanceMode::FreezeRotations => self.rotations_locked = false,
            BalanceMode::StabilizerJoint => self.stabilizer_drive = JointDrive::ZERO,
            _ => {}
        }
    }
}
