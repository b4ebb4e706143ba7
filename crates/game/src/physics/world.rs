use glam::{Quat, Vec3};
use rapier3d::prelude::*;

use crate::skeleton::BoneTransform;

use super::config::{JointDrive, PhysicsConfig};

const ANGULAR_AXES: [JointAxis; 3] = [JointAxis::AngX, JointAxis::AngY, JointAxis::AngZ];

/// Result of a downward floor probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub distance: f32,
    pub normal: Vec3,
}

#[inline]
fn to_vector(v: Vec3) -> Vector {
    Vector::new(v.x, v.y, v.z)
}

#[inline]
fn to_rotation(q: Quat) -> Rotation {
    Rotation::from_xyzw(q.x, q.y, q.z, q.w).normalize()
}

#[inline]
fn to_pose(transform: &BoneTransform) -> Pose {
    Pose::from_parts(to_vector(transform.position), to_rotation(transform.rotation))
}

pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    integration_parameters: IntegrationParameters,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    pub bodies: RigidBodySet,
    pub colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    gravity: Vector,
    friction: Real,
    solver_iterations: usize,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(&PhysicsConfig::default(), 1.0 / 60.0)
    }
}

impl PhysicsWorld {
    pub fn new(config: &PhysicsConfig, dt: Real) -> Self {
        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.dt = dt;
        integration_parameters.min_ccd_dt = dt / 100.0;
        integration_parameters.num_internal_pgs_iterations = config.velocity_iterations;

        Self {
            pipeline: PhysicsPipeline::new(),
            integration_parameters,
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            gravity: Vector::new(0.0, config.gravity, 0.0),
            friction: config.friction,
            solver_iterations: config.solver_iterations,
        }
    }

    pub fn dt(&self) -> Real {
        self.integration_parameters.dt
    }

    pub fn step(&mut self) {
        self.pipeline.step(
            self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            &(),
            &(),
        );
    }

    /// Flat ground slab whose top face sits at `top`.
    pub fn add_ground(&mut self, top: Real, half_size: Real) -> ColliderHandle {
        let collider = ColliderBuilder::cuboid(half_size, 0.1, half_size)
            .translation(Vector::new(0.0, top - 0.1, 0.0))
            .friction(self.friction)
            .build();
        self.colliders.insert(collider)
    }

    /// One ragdoll segment: a ball collider on a dynamic or kinematic body.
    pub fn add_bone_body(
        &mut self,
        pose: &BoneTransform,
        radius: Real,
        mass: Real,
        dynamic: bool,
    ) -> RigidBodyHandle {
        let builder = if dynamic {
            RigidBodyBuilder::dynamic()
                .additional_solver_iterations(self.solver_iterations)
                .ccd_enabled(true)
        } else {
            RigidBodyBuilder::kinematic_position_based()
        };
        let body = builder
            .translation(to_vector(pose.position))
            .rotation(to_vector(pose.rotation.to_scaled_axis()))
            .build();
        let handle = self.bodies.insert(body);

        let collider = ColliderBuilder::ball(radius)
            .mass(mass)
            .friction(self.friction)
            .enabled(dynamic)
            .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);

        handle
    }

    /// Kinematic body without colliders, used as a joint anchor.
    pub fn add_proxy(&mut self, pose: &BoneTransform) -> RigidBodyHandle {
        let body = RigidBodyBuilder::kinematic_position_based()
            .translation(to_vector(pose.position))
            .rotation(to_vector(pose.rotation.to_scaled_axis()))
            .build();
        self.bodies.insert(body)
    }

    /// Ball joint whose angular motors pull the child's rotation relative to the parent
    /// towards a target.
    pub fn add_drive_joint(
        &mut self,
        parent: RigidBodyHandle,
        child: RigidBodyHandle,
        parent_anchor: Vec3,
        drive: JointDrive,
    ) -> ImpulseJointHandle {
        let mut joint = SphericalJointBuilder::new()
            .local_anchor1(to_vector(parent_anchor).into())
            .local_anchor2(Vector::new(0.0, 0.0, 0.0).into())
            .contacts_enabled(false)
            .build();
        for axis in ANGULAR_AXES {
            joint
                .data
                .set_motor_position(axis, 0.0, drive.stiffness, drive.damping);
            joint.data.set_motor_max_force(axis, drive.max_force);
        }
        self.impulse_joints.insert(parent, child, joint, true)
    }

    /// Joint with free linear axes and motorized angular axes. Pulls the child's
    /// orientation towards the parent's without constraining its position.
    pub fn add_orientation_joint(
        &mut self,
        parent: RigidBodyHandle,
        child: RigidBodyHandle,
        drive: JointDrive,
    ) -> ImpulseJointHandle {
        let mut joint = GenericJointBuilder::new(JointAxesMask::empty())
            .contacts_enabled(false)
            .build();
        for axis in ANGULAR_AXES {
            joint.set_motor_position(axis, 0.0, drive.stiffness, drive.damping);
            joint.set_motor_max_force(axis, drive.max_force);
        }
        self.impulse_joints.insert(parent, child, joint, true)
    }

    pub fn set_joint_target(&mut self, handle: ImpulseJointHandle, target: Quat, drive: JointDrive) {
        let Some(joint) = self.impulse_joints.get_mut(handle, true) else {
            return;
        };
        let (x, y, z) = target.normalize().to_euler(glam::EulerRot::XYZ);
        for (axis, angle) in ANGULAR_AXES.into_iter().zip([x, y, z]) {
            joint
                .data
                .set_motor_position(axis, angle, drive.stiffness, drive.damping);
            joint.data.set_motor_max_force(axis, drive.max_force);
        }
    }

    pub fn remove_body(&mut self, handle: RigidBodyHandle) {
        self.bodies.remove(
            handle,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    pub fn body(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn joint_count(&self) -> usize {
        self.impulse_joints.len()
    }

    pub fn body_pose(&self, handle: RigidBodyHandle) -> Option<BoneTransform> {
        self.bodies.get(handle).map(|b| {
            let t = b.translation();
            let r = b.rotation();
            BoneTransform::new(
                Vec3::new(t.x, t.y, t.z),
                Quat::from_xyzw(r.x, r.y, r.z, r.w).normalize(),
            )
        })
    }

    pub fn body_velocity(&self, handle: RigidBodyHandle) -> Option<Vec3> {
        self.bodies.get(handle).map(|b| {
            let v = b.linvel();
            Vec3::new(v.x, v.y, v.z)
        })
    }

    pub fn body_angular_velocity(&self, handle: RigidBodyHandle) -> Option<Vec3> {
        self.bodies.get(handle).map(|b| {
            let w = b.angvel();
            Vec3::new(w.x, w.y, w.z)
        })
    }

    pub fn set_next_kinematic_pose(&mut self, handle: RigidBodyHandle, pose: &BoneTransform) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_next_kinematic_position(to_pose(pose));
        }
    }

    pub fn set_body_rotation(&mut self, handle: RigidBodyHandle, rotation: Quat) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_rotation(to_rotation(rotation), true);
        }
    }

    pub fn set_angular_velocity(&mut self, handle: RigidBodyHandle, velocity: Vec3) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_angvel(to_vector(velocity), true);
        }
    }

    /// Replaces the torque and force accumulated on a body for the next step.
    pub fn set_external_loads(&mut self, handle: RigidBodyHandle, torque: Vec3, force: Vec3) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.reset_torques(false);
            body.reset_forces(false);
            if torque != Vec3::ZERO {
                body.add_torque(to_vector(torque), true);
            }
            if force != Vec3::ZERO {
                body.add_force(to_vector(force), true);
            }
        }
    }

    pub fn lock_rotations(&mut self, handle: RigidBodyHandle, locked: bool) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.lock_rotations(locked, true);
        }
    }

    pub fn is_dynamic(&self, handle: RigidBodyHandle) -> bool {
        self.bodies.get(handle).is_some_and(|b| b.is_dynamic())
    }

    pub fn clamp_angular_velocity(&mut self, handle: RigidBodyHandle, max: Real) {
        let Some(body) = self.bodies.get_mut(handle) else {
            return;
        };
        let w = body.angvel();
        let w = Vec3::new(w.x, w.y, w.z);
        let speed = w.length();
        if speed > max && speed > 0.0 {
            body.set_angvel(to_vector(w * (max / speed)), true);
        }
    }

    /// Casts against static geometry only, so character bodies never count as floor.
    pub fn cast_ray_static(&self, origin: Vec3, direction: Vec3, max_distance: Real) -> Option<RayHit> {
        let query = self.broad_phase.as_query_pipeline(
            self.narrow_phase.query_dispatcher(),
            &self.bodies,
            &self.colliders,
            QueryFilter::only_fixed(),
        );
        let ray = Ray::new(to_vector(origin), to_vector(direction));
        query
            .cast_ray_and_get_normal(&ray, max_distance, true)
            .map(|(_, hit)| RayHit {
                distance: hit.time_of_impact,
                normal: Vec3::new(hit.normal.x, hit.normal.y, hit.normal.z),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_ball_falls_onto_ground() {
        let mut world = PhysicsWorld::default();
        world.add_ground(0.0, 10.0);
        let pose = BoneTransform::new(Vec3::new(0.0, 1.0, 0.0), Quat::IDENTITY);
        let ball = world.add_bone_body(&pose, 0.1, 1.0, true);

        for _ in 0..180 {
            world.step();
        }

        let y = world.body_pose(ball).map(|p| p.position.y).unwrap();
        assert!((y - 0.1).abs() < 0.02, "resting at {y}");
    }

    #[test]
    fn static_ray_ignores_bodies() {
        let mut world = PhysicsWorld::default();
        world.add_ground(0.0, 10.0);
        let pose = BoneTransform::new(Vec3::new(0.0, 0.5, 0.0), Quat::IDENTITY);
        world.add_bone_body(&pose, 0.2, 1.0, true);
        world.step();

        let hit = world
            .cast_ray_static(Vec3::new(0.0, 1.0, 0.0), Vec3::NEG_Y, 2.0)
            .expect("ground hit");
        assert!((hit.distance - 1.0).abs() < 1e-3);
        assert!(hit.normal.dot(Vec3::Y) > 0.99);
    }

    #[test]
    fn angular_velocity_is_clamped() {
        let mut world = PhysicsWorld::default();
        let pose = BoneTransform::new(Vec3::new(0.0, 5.0, 0.0), Quat::IDENTITY);
        let ball = world.add_bone_body(&pose, 0.1, 1.0, true);
        world.set_angular_velocity(ball, Vec3::new(0.0, 100.0, 0.0));
        world.clamp_angular_velocity(ball, 50.0);
        let w = world.body_angular_velocity(ball).unwrap();
        assert!((w.length() - 50.0).abs() < 1e-3);
    }

    #[test]
    fn kinematic_bodies_disable_colliders() {
        let mut world = PhysicsWorld::default();
        let pose = BoneTransform::new(Vec3::ZERO, Quat::IDENTITY);
        let ball = world.add_bone_body(&pose, 0.1, 1.0, false);
        assert!(!world.is_dynamic(ball));
        let body = world.body(ball).unwrap();
        let collider = body.colliders()[0];
        assert!(!world.colliders[collider].is_enabled());
    }
}
