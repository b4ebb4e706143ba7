use std::f32::consts::FRAC_PI_2;

use glam::{Quat, Vec3};
use rkyv::{Archive, Deserialize, Serialize};

use super::IkConfig;
use super::solver::{solve_look, solve_two_bone};
use crate::math::{angle_between_deg, floor_projection, forward, look_rotation, reflect, right};
use crate::skeleton::{BoneId, BoneTransform, Skeleton};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub enum ArmSide {
    Left,
    Right,
}

impl ArmSide {
    fn index(self) -> usize {
        match self {
            ArmSide::Left => 0,
            ArmSide::Right => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmChain {
    pub upper: BoneId,
    pub lower: BoneId,
    pub hand: BoneId,
}

impl ArmChain {
    pub fn bones(&self) -> [BoneId; 3] {
        [self.upper, self.lower, self.hand]
    }
}

/// Bones the arm solver drives. A blender without a rig skips arm IK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IkRig {
    pub left: ArmChain,
    pub right: ArmChain,
}

impl IkRig {
    pub fn humanoid() -> Self {
        Self {
            left: ArmChain {
                upper: BoneId::LeftArm,
                lower: BoneId::LeftForearm,
                hand: BoneId::LeftHand,
            },
            right: ArmChain {
                upper: BoneId::RightArm,
                lower: BoneId::RightForearm,
                hand: BoneId::RightHand,
            },
        }
    }
}

/// Targets computed by the last IK tick, in world space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IkTargets {
    pub look_point: Vec3,
    pub arms_direction: Vec3,
    pub left_hand: BoneTransform,
    pub right_hand: BoneTransform,
    pub left_hint: Vec3,
    pub right_hint: Vec3,
}

/// Hand bones hang along their local -Y; this maps that axis onto the target forward.
fn hand_bind() -> Quat {
    Quat::from_rotation_x(-FRAC_PI_2)
}

#[derive(Debug, Clone)]
pub struct IkBlender {
    config: IkConfig,
    rig: Option<IkRig>,
    aim_direction: Vec3,
    effective_aim: Vec3,
    target_dir_2d: Vec3,
    vertical_percent: f32,
    arm_weights: [f32; 2],
    look_weight: f32,
    targets: IkTargets,
    missing_rig_logged: bool,
}

impl IkBlender {
    pub fn new(config: IkConfig, rig: Option<IkRig>) -> Self {
        Self {
            config,
            rig,
            aim_direction: Vec3::Z,
            effective_aim: Vec3::Z,
            target_dir_2d: Vec3::Z,
            vertical_percent: 0.0,
            arm_weights: [0.0; 2],
            look_weight: 0.0,
            targets: IkTargets::default(),
            missing_rig_logged: false,
        }
    }

    pub fn config(&self) -> &IkConfig {
        &self.config
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enable_ik = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enable_ik
    }

    pub fn aim_direction(&self) -> Vec3 {
        self.aim_direction
    }

    pub fn set_aim_direction(&mut self, direction: Vec3) {
        if let Some(direction) = direction.try_normalize() {
            self.aim_direction = direction;
        }
    }

    /// Aim after reflection, as used by the last tick.
    pub fn effective_aim(&self) -> Vec3 {
        self.effective_aim
    }

    pub fn target_dir_2d(&self) -> Vec3 {
        self.target_dir_2d
    }

    pub fn vertical_percent(&self) -> f32 {
        self.vertical_percent
    }

    pub fn arm_weight(&self, side: ArmSide) -> f32 {
        self.arm_weights[side.index()]
    }

    /// Ignored while IK is disabled.
    pub fn set_arm_weight(&mut self, side: ArmSide, weight: f32) {
        if !self.config.enable_ik {
            return;
        }
        let weight = if weight.is_finite() { weight } else { 0.0 };
        self.arm_weights[side.index()] = weight.clamp(0.0, 1.0);
    }

    pub fn look_weight(&self) -> f32 {
        self.look_weight
    }

    pub fn targets(&self) -> &IkTargets {
        &self.targets
    }

    /// Computes look and arm targets from the aim and applies them to the animated pose.
    pub fn tick(&mut self, skeleton: &mut Skeleton) {
        if !self.config.enable_ik {
            self.arm_weights = [0.0; 2];
            self.look_weight = 0.0;
            return;
        }
        self.look_weight = 1.0;

        let torso = skeleton.world(BoneId::Torso).rotation;
        let torso_forward = forward(torso);

        self.effective_aim = if angle_between_deg(self.aim_direction, torso_forward) > 90.0 {
            reflect(self.aim_direction, torso_forward)
        } else {
            self.aim_direction
        };
        self.target_dir_2d = floor_projection(self.effective_aim);
        self.vertical_percent = self.compute_vertical_percent();

        self.targets.look_point =
            skeleton.world(BoneId::Head).position + self.effective_aim * self.config.look_distance;
        solve_look(
            skeleton,
            self.targets.look_point,
            self.config.neck_look_share,
            self.look_weight,
        );

        let Some(rig) = self.rig else {
            if !self.missing_rig_logged {
                log::warn!("Arm IK has no hand targets, skipping arm placement");
                self.missing_rig_logged = true;
            }
            return;
        };

        self.compute_arm_targets(skeleton, right(torso));
        let targets = self.targets;
        solve_two_bone(
            skeleton,
            rig.left.bones(),
            targets.left_hand,
            targets.left_hint,
            self.arm_weights[ArmSide::Left.index()],
        );
        solve_two_bone(
            skeleton,
            rig.right.bones(),
            targets.right_hand,
            targets.right_hint,
            self.arm_weights[ArmSide::Right.index()],
        );
    }

    fn compute_vertical_percent(&self) -> f32 {
        let angle = angle_between_deg(self.effective_aim, Vec3::Y) - 90.0;
        let span = (self.config.max_target_dir_angle - self.config.min_target_dir_angle).abs();
        if span <= f32::EPSILON {
            return 0.0;
        }
        1.0 - ((angle - self.config.min_target_dir_angle) / span).clamp(0.0, 1.0)
    }

    fn compute_arm_targets(&mut self, skeleton: &Skeleton, torso_right: Vec3) {
        let config = &self.config;
        let span = (config.max_arms_angle - config.min_arms_angle).abs();
        let arms_angle =
            self.vertical_percent * span + config.min_arms_angle + config.arms_angle_offset;

        let swing = Quat::from_axis_angle(torso_right.normalize_or_zero(), arms_angle.to_radians());
        let arms_dir = swing * self.target_dir_2d;
        let distance = config.arms_distance.evaluate(self.vertical_percent);
        let middle = skeleton.world(BoneId::Chest).position + arms_dir * distance;

        let up_ref = torso_right.cross(arms_dir).normalize_or_zero();
        let horizontal_left = up_ref.cross(arms_dir).normalize_or_zero();
        let hands_rotation = if arms_dir == Vec3::ZERO {
            Quat::IDENTITY
        } else {
            look_rotation(arms_dir, up_ref)
        };

        let twist = (90.0 - config.hands_rotation_offset).to_radians();
        let separation = config.arms_horizontal_separation;

        self.targets.arms_direction = arms_dir;
        self.targets.left_hand = BoneTransform::new(
            middle + horizontal_left * separation / 2.0,
            hands_rotation * Quat::from_rotation_z(-twist) * hand_bind(),
        );
        self.targets.right_hand = BoneTransform::new(
            middle - horizontal_left * separation / 2.0,
            hands_rotation * Quat::from_rotation_z(twist) * hand_bind(),
        );
        self.targets.left_hint = middle + horizontal_left * separation - up_ref;
        self.targets.right_hint = middle - horizontal_left * separation - up_ref;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blender() -> IkBlender {
        IkBlender::new(IkConfig::default(), Some(IkRig::humanoid()))
    }

    #[test]
    fn backward_aim_is_reflected_in_front() {
        let mut ik = blender();
        let mut skeleton = Skeleton::default();
        let aim = Vec3::new(0.3, 0.2, -1.0).normalize();
        ik.set_aim_direction(aim);
        ik.tick(&mut skeleton);

        let effective = ik.effective_aim();
        assert!(angle_between_deg(effective, Vec3::Z) <= 90.0 + 1e-3);
        assert!((effective - Vec3::new(aim.x, aim.y, -aim.z)).length() < 1e-4);
    }

    #[test]
    fn reflection_never_exceeds_right_angle() {
        let mut ik = blender();
        let mut skeleton = Skeleton::default();
        for i in 0..24 {
            let yaw = i as f32 * std::f32::consts::TAU / 24.0;
            for pitch in [-1.2f32, -0.4, 0.0, 0.6, 1.3] {
                let aim = Vec3::new(yaw.sin() * pitch.cos(), pitch.sin(), yaw.cos() * pitch.cos());
                ik.set_aim_direction(aim);
                ik.tick(&mut skeleton);
                let torso_forward = forward(skeleton.world(BoneId::Torso).rotation);
                assert!(angle_between_deg(ik.effective_aim(), torso_forward) <= 90.0 + 1e-3);
            }
        }
    }

    #[test]
    fn vertical_percent_spans_configured_range() {
        let mut ik = blender();
        let mut skeleton = Skeleton::default();

        ik.set_aim_direction(Vec3::Z);
        ik.tick(&mut skeleton);
        // Horizontal aim sits 30 degrees into a 90 degree window.
        assert!((ik.vertical_percent() - (1.0 - 30.0 / 90.0)).abs() < 1e-4);

        ik.set_aim_direction(Vec3::new(0.0, 1.0, 0.01));
        ik.tick(&mut skeleton);
        assert!((ik.vertical_percent() - 1.0).abs() < 1e-4);

        ik.set_aim_direction(Vec3::new(0.0, -1.0, 0.01));
        ik.tick(&mut skeleton);
        assert!(ik.vertical_percent().abs() < 1e-4);
    }

    #[test]
    fn hands_straddle_aim() {
        let mut ik = blender();
        let mut skeleton = Skeleton::default();
        ik.set_aim_direction(Vec3::Z);
        ik.tick(&mut skeleton);

        let targets = ik.targets();
        assert!(targets.left_hand.position.x > targets.right_hand.position.x);
        let separation = targets.left_hand.position.distance(targets.right_hand.position);
        assert!((separation - 0.75).abs() < 1e-4);
        assert!(targets.arms_direction.z > 0.0);
        assert!(targets.left_hint.y < targets.left_hand.position.y);
    }

    #[test]
    fn arms_rise_with_aim() {
        let mut ik = blender();
        let mut skeleton = Skeleton::default();

        ik.set_aim_direction(Vec3::new(0.0, -0.5, 1.0));
        ik.tick(&mut skeleton);
        let low = ik.targets().arms_direction.y;

        ik.set_aim_direction(Vec3::new(0.0, 0.5, 1.0));
        ik.tick(&mut skeleton);
        let high = ik.targets().arms_direction.y;

        assert!(high > low);
    }

    #[test]
    fn look_point_projects_from_head() {
        let mut ik = blender();
        let mut skeleton = Skeleton::default();
        let head = skeleton.world(BoneId::Head).position;
        ik.set_aim_direction(Vec3::Z);
        ik.tick(&mut skeleton);
        assert!((ik.targets().look_point - (head + Vec3::Z * 5.0)).length() < 1e-4);
        assert_eq!(ik.look_weight(), 1.0);
    }

    #[test]
    fn disabled_ik_zeroes_weights() {
        let mut ik = blender();
        ik.set_arm_weight(ArmSide::Left, 0.8);
        ik.set_enabled(false);

        let mut skeleton = Skeleton::default();
        let before = skeleton.world(BoneId::Head);
        ik.tick(&mut skeleton);

        assert_eq!(ik.arm_weight(ArmSide::Left), 0.0);
        assert_eq!(ik.look_weight(), 0.0);
        assert_eq!(skeleton.world(BoneId::Head), before);

        ik.set_arm_weight(ArmSide::Right, 1.0);
        assert_eq!(ik.arm_weight(ArmSide::Right), 0.0);
    }

    #[test]
    fn full_weight_moves_hand_to_target() {
        let mut ik = blender();
        ik.set_arm_weight(ArmSide::Right, 1.0);
        let mut skeleton = Skeleton::default();
        ik.set_aim_direction(Vec3::Z);
        ik.tick(&mut skeleton);

        let hand = skeleton.world(BoneId::RightHand).position;
        let target = ik.targets().right_hand.position;
        let shoulder = skeleton.world(BoneId::RightArm).position;
        let reach = 0.5;
        if shoulder.distance(target) < reach {
            assert!(hand.distance(target) < 1e-3);
        } else {
            assert!((hand - shoulder).normalize().dot((target - shoulder).normalize()) > 0.99);
        }
    }

    #[test]
    fn missing_rig_skips_arms() {
        let mut ik = IkBlender::new(IkConfig::default(), None);
        ik.set_arm_weight(ArmSide::Left, 1.0);
        let mut skeleton = Skeleton::default();
        let before = skeleton.world(BoneId::LeftHand);
        ik.tick(&mut skeleton);

        assert_eq!(skeleton.world(BoneId::LeftHand).position, before.position);
        assert_eq!(ik.targets().left_hand, BoneTransform::default());
    }
}
