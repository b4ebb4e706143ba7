use glam::{Quat, Vec3};
use rapier3d::prelude::{ImpulseJointHandle, RigidBodyHandle};

use crate::animation::JointTargets;
use crate::balance::{TorsoCommand, TorsoState};
use crate::body::BodyPartRegistry;
use crate::input::FloorHit;
use crate::skeleton::{BONE_COUNT, BoneFlags, BoneId, Skeleton};

use super::config::JointDrive;
use super::state::PhysicsState;
use super::world::PhysicsWorld;

struct Stabilizer {
    proxy: RigidBodyHandle,
    joint: ImpulseJointHandle,
    drive: JointDrive,
}

/// Rigid-body copy of a skeleton: one ball per bone, motorized ball joints between
/// parent and child, and a kinematic proxy that holds the torso upright.
pub struct Ragdoll {
    bodies: Vec<RigidBodyHandle>,
    joints: [Option<ImpulseJointHandle>; BONE_COUNT],
    stabilizer: Option<Stabilizer>,
    state: PhysicsState,
    base_drive: JointDrive,
    rotations_locked: bool,
}

impl Ragdoll {
    pub fn build(
        world: &mut PhysicsWorld,
        skeleton: &Skeleton,
        state: PhysicsState,
        base_drive: JointDrive,
    ) -> Self {
        let dynamic = state.is_simulated();
        let bodies: Vec<RigidBodyHandle> = BoneId::ALL
            .iter()
            .map(|&bone| world.add_bone_body(&skeleton.world(bone), bone.radius(), bone.mass(), dynamic))
            .collect();

        let mut joints = [None; BONE_COUNT];
        let mut stabilizer = None;
        if dynamic {
            for bone in BoneId::ALL {
                let Some(parent) = bone.parent() else {
                    continue;
                };
                if !bone.flags().contains(BoneFlags::JOINTED) {
                    continue;
                }
                joints[bone.index()] = Some(world.add_drive_joint(
                    bodies[parent.index()],
                    bodies[bone.index()],
                    bone.rest_offset(),
                    base_drive,
                ));
            }

            let torso = bodies[BoneId::Torso.index()];
            let proxy = world.add_proxy(&skeleton.world(BoneId::Torso));
            let joint = world.add_orientation_joint(proxy, torso, JointDrive::ZERO);
            stabilizer = Some(Stabilizer {
                proxy,
                joint,
                drive: JointDrive::ZERO,
            });
        }

        Self {
            bodies,
            joints,
            stabilizer,
            state,
            base_drive,
            rotations_locked: false,
        }
    }

    pub fn state(&self) -> &PhysicsState {
        &self.state
    }

    pub fn body(&self, bone: BoneId) -> RigidBodyHandle {
        self.bodies[bone.index()]
    }

    pub fn torso(&self) -> RigidBodyHandle {
        self.body(BoneId::Torso)
    }

    pub fn joint_count(&self) -> usize {
        self.joints.iter().flatten().count()
    }

    pub fn stabilizer_drive(&self) -> JointDrive {
        self.stabilizer
            .as_ref()
            .map_or(JointDrive::ZERO, |s| s.drive)
    }

    pub fn torso_state(&self, world: &PhysicsWorld) -> TorsoState {
        let torso = self.torso();
        let pose = world.body_pose(torso).unwrap_or_default();
        TorsoState {
            position: pose.position,
            rotation: pose.rotation,
            linear_velocity: world.body_velocity(torso).unwrap_or_default(),
            angular_velocity: world.body_angular_velocity(torso).unwrap_or_default(),
        }
    }

    /// Applies one balance tick to the torso. Ignored on kinematic copies.
    pub fn apply_command(&mut self, world: &mut PhysicsWorld, command: &TorsoCommand) {
        if !self.state.is_simulated() {
            return;
        }
        let torso = self.torso();

        if command.lock_rotations != self.rotations_locked {
            world.lock_rotations(torso, command.lock_rotations);
            self.rotations_locked = command.lock_rotations;
        }
        world.set_angular_velocity(torso, command.angular_velocity);
        world.set_external_loads(torso, command.torque, command.force);
        if let Some(rotation) = command.rotation {
            world.set_body_rotation(torso, rotation);
        }

        let Some(stabilizer) = self.stabilizer.as_mut() else {
            return;
        };
        if let Some(target) = command.stabilizer_target {
            world.set_next_kinematic_pose(stabilizer.proxy, &target);
        } else {
            let pose = world.body_pose(torso).unwrap_or_default();
            world.set_next_kinematic_pose(stabilizer.proxy, &pose);
        }
        if command.stabilizer_drive != stabilizer.drive {
            stabilizer.drive = command.stabilizer_drive;
            world.set_joint_target(stabilizer.joint, Quat::IDENTITY, stabilizer.drive);
        }
    }

    /// Points every joint motor at its animated target, scaled by body-part strength.
    pub fn drive_joints(
        &self,
        world: &mut PhysicsWorld,
        targets: &JointTargets,
        body_parts: &BodyPartRegistry,
    ) {
        for (bone, target) in targets.iter() {
            let Some(joint) = self.joints[bone.index()] else {
                continue;
            };
            let drive = self.base_drive.scaled(body_parts.joint_strength(bone));
            world.set_joint_target(joint, target, drive);
        }
    }

    pub fn clamp_velocities(&self, world: &mut PhysicsWorld) {
        if !self.state.is_simulated() {
            return;
        }
        for &body in &self.bodies {
            world.clamp_angular_velocity(body, self.state.max_angular_velocity);
        }
    }

    /// Copies simulated body poses into `skeleton` and refreshes its locals.
    pub fn read_pose(&self, world: &PhysicsWorld, skeleton: &mut Skeleton) {
        for bone in BoneId::ALL {
            if let Some(pose) = world.body_pose(self.body(bone)) {
                skeleton.set_world(bone, pose);
            }
        }
        skeleton.fit_anchor(BoneId::Torso);
        skeleton.refresh_locals();
    }

    /// Moves kinematic bodies onto the transforms of `skeleton`.
    pub fn follow_pose(&self, world: &mut PhysicsWorld, skeleton: &Skeleton) {
        if self.state.is_simulated() {
            return;
        }
        for bone in BoneId::ALL {
            world.set_next_kinematic_pose(self.body(bone), &skeleton.world(bone));
        }
    }

    /// Downward probes from both feet against static geometry.
    pub fn probe_feet(&self, world: &PhysicsWorld, max_distance: f32) -> [Option<FloorHit>; 2] {
        BoneId::FEET.map(|foot| {
            let origin = world.body_pose(self.body(foot))?.position;
            world
                .cast_ray_static(origin, Vec3::NEG_Y, max_distance)
                .map(|hit| FloorHit {
                    distance: hit.distance,
                    normal: hit.normal,
                })
        })
    }

    /// Removes every body, joint and the stabilizer proxy from `world`.
    pub fn teardown(self, world: &mut PhysicsWorld) {
        if let Some(stabilizer) = self.stabilizer {
            world.remove_body(stabilizer.proxy);
        }
        for body in self.bodies {
            world.remove_body(body);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::Role;
    use crate::physics::PhysicsConfig;

    fn spawn(role: Role) -> (PhysicsWorld, Ragdoll, Skeleton) {
        let config = PhysicsConfig::default();
        let mut world = PhysicsWorld::new(&config, 1.0 / 60.0);
        world.add_ground(0.0, config.ground_half_size);
        let skeleton = Skeleton::default();
        let state = PhysicsState::for_role(role, &config);
        let ragdoll = Ragdoll::build(&mut world, &skeleton, state, config.joint_drive);
        (world, ragdoll, skeleton)
    }

    #[test]
    fn authority_ragdoll_is_jointed() {
        let (world, ragdoll, _) = spawn(Role::Authority);
        assert_eq!(ragdoll.joint_count(), BONE_COUNT - 1);
        assert_eq!(world.body_count(), BONE_COUNT + 1);
        assert_eq!(world.joint_count(), BONE_COUNT);
        assert!(world.is_dynamic(ragdoll.torso()));
    }

    #[test]
    fn observer_ragdoll_is_kinematic() {
        let (world, ragdoll, _) = spawn(Role::RemoteObserver);
        assert_eq!(ragdoll.joint_count(), 0);
        assert_eq!(world.body_count(), BONE_COUNT);
        assert!(!world.is_dynamic(ragdoll.torso()));
    }

    #[test]
    fn feet_see_the_ground() {
        let (mut world, ragdoll, _) = spawn(Role::RemoteObserver);
        world.step();
        let [left, right] = ragdoll.probe_feet(&world, 0.3);
        let left = left.expect("left foot hit");
        assert!((left.distance - 0.08).abs() < 1e-3);
        assert!(right.is_some());
    }

    #[test]
    fn read_pose_matches_bodies() {
        let (world, ragdoll, _) = spawn(Role::Authority);
        let mut copy = Skeleton::default();
        ragdoll.read_pose(&world, &mut copy);
        let head = copy.world(BoneId::Head).position;
        assert!((head - Vec3::new(0.0, 1.62, 0.0)).length() < 1e-4);
        assert!((copy.anchor().position).length() < 1e-4);
    }

    #[test]
    fn teardown_removes_everything() {
        let (mut world, ragdoll, _) = spawn(Role::Authority);
        ragdoll.teardown(&mut world);
        assert_eq!(world.body_count(), 0);
        assert_eq!(world.joint_count(), 0);
    }
}
