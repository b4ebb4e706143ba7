use glam::Quat;

use crate::skeleton::{BONE_COUNT, BoneFlags, BoneId, Skeleton};

/// Per-joint target rotations taken from the animated pose, relative to each
/// joint's initial local rotation.
#[derive(Debug, Clone)]
pub struct JointTargets {
    initial: [Quat; BONE_COUNT],
    targets: [Quat; BONE_COUNT],
}

impl JointTargets {
    /// Caches the initial local rotations of `skeleton` as the reference frame.
    pub fn capture(skeleton: &Skeleton) -> Self {
        let mut initial = [Quat::IDENTITY; BONE_COUNT];
        for bone in skeleton.bones() {
            initial[bone.id.index()] = bone.local.rotation;
        }
        Self {
            initial,
            targets: [Quat::IDENTITY; BONE_COUNT],
        }
    }

    pub fn update(&mut self, animated: &Skeleton) {
        for bone in animated.bones() {
            if !bone.flags.contains(BoneFlags::JOINTED) {
                continue;
            }
            let i = bone.id.index();
            self.targets[i] = (self.initial[i].inverse() * bone.local.rotation).normalize();
        }
    }

    pub fn target(&self, bone: BoneId) -> Quat {
        self.targets[bone.index()]
    }

    pub fn initial(&self, bone: BoneId) -> Quat {
        self.initial[bone.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (BoneId, Quat)> + '_ {
        BoneId::ALL
            .iter()
            .filter(|b| b.flags().contains(BoneFlags::JOINTED))
            .map(|&b| (b, self.targets[b.index()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rest_pose_targets_identity() {
        let skeleton = Skeleton::default();
        let mut targets = JointTargets::capture(&skeleton);
        targets.update(&skeleton);
        assert!(targets.iter().all(|(_, q)| q.angle_between(Quat::IDENTITY) < 1e-5));
        assert_eq!(targets.iter().count(), BONE_COUNT - 1);
    }

    #[test]
    fn target_is_relative_to_initial() {
        let mut skeleton = Skeleton::default();
        let initial = Quat::from_rotation_x(0.3);
        skeleton.set_local_rotation(BoneId::LeftCalve, initial);
        let mut targets = JointTargets::capture(&skeleton);

        skeleton.set_local_rotation(BoneId::LeftCalve, Quat::from_rotation_x(0.8));
        targets.update(&skeleton);

        let expected = Quat::from_rotation_x(0.5);
        assert!(targets.target(BoneId::LeftCalve).angle_between(expected) < 1e-4);
        assert_eq!(targets.initial(BoneId::LeftCalve), initial);
    }
}
