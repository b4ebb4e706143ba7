use bitflags::bitflags;
use glam::Vec3;

pub const BONE_COUNT: usize = 16;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BoneFlags: u8 {
        /// Driven by the animator and IK on the animated skeleton.
        const ANIMATED = 1 << 0;
        /// Backed by a rigid body on the physical skeleton.
        const PHYSICS = 1 << 1;
        /// Connected to its parent by a motorized joint.
        const JOINTED = 1 << 2;
        /// Included in pose snapshots.
        const SYNCED = 1 << 3;
    }
}

/// Anatomical bones of the humanoid rig. Declaration order lists every parent before
/// its children and doubles as the snapshot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum BoneId {
    Torso,
    Chest,
    Neck,
    Head,
    LeftArm,
    LeftForearm,
    LeftHand,
    RightArm,
    RightForearm,
    RightHand,
    LeftThigh,
    LeftCalve,
    LeftFoot,
    RightThigh,
    RightCalve,
    RightFoot,
}

impl BoneId {
    pub const ALL: [BoneId; BONE_COUNT] = [
        BoneId::Torso,
        BoneId::Chest,
        BoneId::Neck,
        BoneId::Head,
        BoneId::LeftArm,
        BoneId::LeftForearm,
        BoneId::LeftHand,
        BoneId::RightArm,
        BoneId::RightForearm,
        BoneId::RightHand,
        BoneId::LeftThigh,
        BoneId::LeftCalve,
        BoneId::LeftFoot,
        BoneId::RightThigh,
        BoneId::RightCalve,
        BoneId::RightFoot,
    ];

    pub const FEET: [BoneId; 2] = [BoneId::LeftFoot, BoneId::RightFoot];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn parent(self) -> Option<BoneId> {
        use BoneId::*;
        match self {
            Torso => None,
            Chest => Some(Torso),
            Neck => Some(Chest),
            Head => Some(Neck),
            LeftArm | RightArm => Some(Chest),
            LeftForearm => Some(LeftArm),
            LeftHand => Some(LeftForearm),
            RightForearm => Some(RightArm),
            RightHand => Some(RightForearm),
            LeftThigh | RightThigh => Some(Torso),
            LeftCalve => Some(LeftThigh),
            LeftFoot => Some(LeftCalve),
            RightCalve => Some(RightThigh),
            RightFoot => Some(RightCalve),
        }
    }

    /// Rest translation relative to the parent bone. The torso offset is relative to the
    /// character anchor, which sits at floor level between the feet.
    pub fn rest_offset(self) -> Vec3 {
        use BoneId::*;
        match self {
            Torso => Vec3::new(0.0, 1.0, 0.0),
            Chest => Vec3::new(0.0, 0.25, 0.0),
            Neck => Vec3::new(0.0, 0.25, 0.0),
            Head => Vec3::new(0.0, 0.12, 0.0),
            LeftArm => Vec3::new(0.22, 0.18, 0.0),
            RightArm => Vec3::new(-0.22, 0.18, 0.0),
            LeftForearm | RightForearm => Vec3::new(0.0, -0.26, 0.0),
            LeftHand | RightHand => Vec3::new(0.0, -0.24, 0.0),
            LeftThigh => Vec3::new(0.09, -0.08, 0.0),
            RightThigh => Vec3::new(-0.09, -0.08, 0.0),
            LeftCalve | RightCalve | LeftFoot | RightFoot => Vec3::new(0.0, -0.42, 0.0),
        }
    }

    pub fn radius(self) -> f32 {
        use BoneId::*;
        match self {
            Torso | Chest => 0.15,
            Head => 0.1,
            Neck => 0.06,
            LeftArm | RightArm => 0.06,
            LeftForearm | RightForearm | LeftHand | RightHand => 0.045,
            LeftThigh | RightThigh => 0.08,
            LeftCalve | RightCalve => 0.065,
            LeftFoot | RightFoot => 0.06,
        }
    }

    pub fn mass(self) -> f32 {
        use BoneId::*;
        match self {
            Torso => 10.0,
            Chest => 8.0,
            Neck => 1.0,
            Head => 4.0,
            LeftArm | RightArm => 2.0,
            LeftForearm | RightForearm => 1.5,
            LeftHand | RightHand => 0.5,
            LeftThigh | RightThigh => 5.0,
            LeftCalve | RightCalve => 3.0,
            LeftFoot | RightFoot => 1.0,
        }
    }

    pub fn flags(self) -> BoneFlags {
        let base = BoneFlags::ANIMATED | BoneFlags::PHYSICS | BoneFlags::SYNCED;
        if self.parent().is_some() {
            base | BoneFlags::JOINTED
        } else {
            base
        }
    }

    pub fn name(self) -> &'static str {
        use BoneId::*;
        match self {
            Torso => "Torso",
            Chest => "Chest",
            Neck => "Neck",
            Head => "Head",
            LeftArm => "LeftArm",
            LeftForearm => "LeftForearm",
            LeftHand => "LeftHand",
            RightArm => "RightArm",
            RightForearm => "RightForearm",
            RightHand => "RightHand",
            LeftThigh => "LeftThigh",
            LeftCalve => "LeftCalve",
            LeftFoot => "LeftFoot",
            RightThigh => "RightThigh",
            RightCalve => "RightCalve",
            RightFoot => "RightFoot",
        }
    }
}

impl std::fmt::Display for BoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parents_precede_children() {
        for bone in BoneId::ALL {
            if let Some(parent) = bone.parent() {
                assert!(parent.index() < bone.index(), "{bone} before {parent}");
            }
        }
    }

    #[test]
    fn index_round_trips() {
        for (i, bone) in BoneId::ALL.iter().enumerate() {
            assert_eq!(bone.index(), i);
            assert_eq!(BoneId::from_index(i), Some(*bone));
        }
        assert_eq!(BoneId::from_index(BONE_COUNT), None);
    }

    #[test]
    fn only_root_is_unjointed() {
        let unjointed: Vec<_> = BoneId::ALL
            .iter()
            .filter(|b| !b.flags().contains(BoneFlags::JOINTED))
            .collect();
        assert_eq!(unjointed, vec![&BoneId::Torso]);
    }
}
