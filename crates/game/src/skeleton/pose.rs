use glam::{Quat, Vec3};

use super::bone::{BONE_COUNT, BoneFlags, BoneId};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneTransform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl BoneTransform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Applies `child`, expressed in this frame, and returns it in the parent frame.
    pub fn compose(&self, child: &BoneTransform) -> BoneTransform {
        BoneTransform {
            position: self.position + self.rotation * child.position,
            rotation: (self.rotation * child.rotation).normalize(),
        }
    }

    /// Expresses `world` relative to this frame.
    pub fn relative(&self, world: &BoneTransform) -> BoneTransform {
        let inv = self.rotation.inverse();
        BoneTransform {
            position: inv * (world.position - self.position),
            rotation: (inv * world.rotation).normalize(),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.rotation.is_finite()
    }
}

#[derive(Debug, Clone)]
pub struct Bone {
    pub id: BoneId,
    pub flags: BoneFlags,
    pub local: BoneTransform,
    pub world: BoneTransform,
}

/// Ordered bone hierarchy with local and world transforms. The anchor places the
/// whole rig in the world.
#[derive(Debug, Clone)]
pub struct Skeleton {
    anchor: BoneTransform,
    bones: Vec<Bone>,
}

impl Default for Skeleton {
    fn default() -> Self {
        Self::humanoid(BoneTransform::IDENTITY)
    }
}

impl Skeleton {
    pub fn humanoid(anchor: BoneTransform) -> Self {
        let bones = BoneId::ALL
            .iter()
            .map(|&id| Bone {
                id,
                flags: id.flags(),
                local: BoneTransform::new(id.rest_offset(), Quat::IDENTITY),
                world: BoneTransform::IDENTITY,
            })
            .collect();

        let mut skeleton = Self { anchor, bones };
        skeleton.solve_world();
        skeleton
    }

    pub fn anchor(&self) -> BoneTransform {
        self.anchor
    }

    pub fn set_anchor(&mut self, anchor: BoneTransform) {
        self.anchor = anchor;
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn bone(&self, id: BoneId) -> &Bone {
        &self.bones[id.index()]
    }

    pub fn world(&self, id: BoneId) -> BoneTransform {
        self.bones[id.index()].world
    }

    pub fn local(&self, id: BoneId) -> BoneTransform {
        self.bones[id.index()].local
    }

    pub fn set_local_rotation(&mut self, id: BoneId, rotation: Quat) {
        self.bones[id.index()].local.rotation = rotation.normalize();
    }

    /// Overwrites a world transform without touching locals. Used for bones whose pose
    /// comes from physics or from snapshots.
    pub fn set_world(&mut self, id: BoneId, world: BoneTransform) {
        self.bones[id.index()].world = world;
    }

    /// Moves the anchor under a root bone so the bone keeps its world transform at its
    /// rest offset.
    pub fn fit_anchor(&mut self, root: BoneId) {
        let world = self.world(root);
        self.anchor = BoneTransform::new(
            world.position - world.rotation * root.rest_offset(),
            world.rotation,
        );
    }

    pub fn parent_world(&self, id: BoneId) -> BoneTransform {
        match id.parent() {
            Some(parent) => self.world(parent),
            None => self.anchor,
        }
    }

    /// Forward kinematics from the anchor through every local transform.
    pub fn solve_world(&mut self) {
        for i in 0..self.bones.len() {
            let id = self.bones[i].id;
            let parent = self.parent_world(id);
            self.bones[i].world = parent.compose(&self.bones[i].local);
        }
    }

    /// Recomputes locals from world transforms, the inverse of [`Skeleton::solve_world`].
    pub fn refresh_locals(&mut self) {
        for i in 0..self.bones.len() {
            let id = self.bones[i].id;
            let parent = self.parent_world(id);
            self.bones[i].local = parent.relative(&self.bones[i].world);
        }
    }

    /// Rotates a bone in world space about its own origin and re-solves its descendants.
    pub fn rotate_world(&mut self, id: BoneId, delta: Quat) {
        let parent = self.parent_world(id);
        let world_rotation = (delta * self.world(id).rotation).normalize();
        self.bones[id.index()].local.rotation =
            (parent.rotation.inverse() * world_rotation).normalize();
        self.solve_world();
    }

    pub fn synced_bones(&self) -> impl Iterator<Item = &Bone> {
        self.bones
            .iter()
            .filter(|b| b.flags.contains(BoneFlags::SYNCED))
    }

    pub fn sample_positions(&self) -> Vec<Vec3> {
        self.synced_bones().map(|b| b.world.position).collect()
    }

    pub fn sample_rotations(&self) -> Vec<Quat> {
        self.synced_bones().map(|b| b.world.rotation).collect()
    }

    pub fn bone_count(&self) -> usize {
        BONE_COUNT
    }
}
