use std::f32::consts::TAU;

use glam::Quat;

use crate::skeleton::{BoneId, Skeleton};

pub const IDLE_CLIP: &str = "Idle";
pub const IN_THE_AIR_CLIP: &str = "InTheAir";

const STRIDE_FREQUENCY: f32 = 1.2;
const THIGH_SWING: f32 = 0.5;
const KNEE_BEND: f32 = 0.6;
const ARM_SWING: f32 = 0.35;
const ARM_REST_SPREAD: f32 = 0.15;
const AIRBORNE_ARM_SPREAD: f32 = 1.2;

/// Procedural stand-in for clip playback. Holds the same parameters an animation
/// state machine would (`clip`, `speed`, `moving`, `forwardSpeed`) and writes
/// local rotations into the animated skeleton.
#[derive(Debug, Clone)]
pub struct Animator {
    clip: String,
    speed: f32,
    moving: bool,
    forward_speed: f32,
    phase: f32,
}

impl Default for Animator {
    fn default() -> Self {
        Self {
            clip: IDLE_CLIP.to_string(),
            speed: 1.0,
            moving: false,
            forward_speed: 0.0,
            phase: 0.0,
        }
    }
}

impl Animator {
    pub fn clip(&self) -> &str {
        &self.clip
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn is_moving(&self) -> bool {
        self.moving
    }

    pub fn forward_speed(&self) -> f32 {
        self.forward_speed
    }

    pub fn play(&mut self, clip: &str, speed: f32) {
        if self.clip != clip {
            self.phase = 0.0;
        }
        self.clip = clip.to_string();
        self.speed = speed;
    }

    /// Returns whether any movement parameter changed.
    pub fn set_movement(&mut self, moving: bool, speed: f32, forward_speed: f32) -> bool {
        let changed = self.moving != moving
            || (self.speed - speed).abs() > 1e-3
            || (self.forward_speed - forward_speed).abs() > 1e-3;
        self.moving = moving;
        self.speed = speed;
        self.forward_speed = forward_speed;
        changed
    }

    pub fn sample(&mut self, skeleton: &mut Skeleton, dt: f32) {
        for bone in BoneId::ALL {
            skeleton.set_local_rotation(bone, Quat::IDENTITY);
        }

        if self.clip == IN_THE_AIR_CLIP {
            skeleton.set_local_rotation(BoneId::LeftArm, Quat::from_rotation_z(AIRBORNE_ARM_SPREAD));
            skeleton.set_local_rotation(BoneId::RightArm, Quat::from_rotation_z(-AIRBORNE_ARM_SPREAD));
            skeleton.set_local_rotation(BoneId::LeftThigh, Quat::from_rotation_x(-0.4));
            skeleton.set_local_rotation(BoneId::RightThigh, Quat::from_rotation_x(-0.4));
            skeleton.set_local_rotation(BoneId::LeftCalve, Quat::from_rotation_x(KNEE_BEND));
            skeleton.set_local_rotation(BoneId::RightCalve, Quat::from_rotation_x(KNEE_BEND));
            skeleton.solve_world();
            return;
        }

        let amplitude = if self.moving { self.speed.clamp(0.0, 1.0) } else { 0.0 };
        if self.moving {
            let direction = if self.forward_speed < 0.0 { -1.0 } else { 1.0 };
            self.phase = (self.phase + dt * TAU * STRIDE_FREQUENCY * amplitude * direction)
                .rem_euclid(TAU);
        }

        let swing = self.phase.sin() * amplitude;
        let left_arm = Quat::from_rotation_z(ARM_REST_SPREAD) * Quat::from_rotation_x(ARM_SWING * swing);
        let right_arm =
            Quat::from_rotation_z(-ARM_REST_SPREAD) * Quat::from_rotation_x(-ARM_SWING * swing);
        skeleton.set_local_rotation(BoneId::LeftArm, left_arm);
        skeleton.set_local_rotation(BoneId::RightArm, right_arm);

        skeleton.set_local_rotation(BoneId::LeftThigh, Quat::from_rotation_x(-THIGH_SWING * swing));
        skeleton.set_local_rotation(BoneId::RightThigh, Quat::from_rotation_x(THIGH_SWING * swing));
        skeleton.set_local_rotation(
            BoneId::LeftCalve,
            Quat::from_rotation_x(KNEE_BEND * swing.max(0.0)),
        );
        skeleton.set_local_rotation(
            BoneId::RightCalve,
            Quat::from_rotation_x(KNEE_BEND * (-swing).max(0.0)),
        );
        skeleton.solve_world();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_switches_clip_and_speed() {
        let mut animator = Animator::default();
        animator.play(IN_THE_AIR_CLIP, 0.5);
        assert_eq!(animator.clip(), IN_THE_AIR_CLIP);
        assert_eq!(animator.speed(), 0.5);
    }

    #[test]
    fn set_movement_reports_changes() {
        let mut animator = Animator::default();
        assert!(animator.set_movement(true, 1.0, 1.0));
        assert!(!animator.set_movement(true, 1.0, 1.0));
        assert!(animator.set_movement(false, 0.0, 0.0));
    }

    #[test]
    fn idle_keeps_legs_straight() {
        let mut animator = Animator::default();
        let mut skeleton = Skeleton::default();
        animator.sample(&mut skeleton, 0.1);
        assert_eq!(skeleton.local(BoneId::LeftThigh).rotation, Quat::IDENTITY);
    }

    #[test]
    fn walking_swings_legs_in_opposition() {
        let mut animator = Animator::default();
        animator.set_movement(true, 1.0, 1.0);
        let mut skeleton = Skeleton::default();
        animator.sample(&mut skeleton, 0.1);

        let left = skeleton.world(BoneId::LeftFoot).position.z;
        let right = skeleton.world(BoneId::RightFoot).position.z;
        assert!(left > 0.0);
        assert!(right < 0.0);
    }

    #[test]
    fn airborne_pose_spreads_arms() {
        let mut animator = Animator::default();
        animator.play(IN_THE_AIR_CLIP, 1.0);
        let mut skeleton = Skeleton::default();
        animator.sample(&mut skeleton, 0.02);
        let hand = skeleton.world(BoneId::LeftHand).position;
        let shoulder = skeleton.world(BoneId::LeftArm).position;
        assert!(hand.x - shoulder.x > 0.4);
    }
}
