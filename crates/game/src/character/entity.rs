use glam::{Quat, Vec2, Vec3};

use crate::animation::{
    Animator, ArmSide, IDLE_CLIP, IN_THE_AIR_CLIP, IkBlender, IkRig, JointTargets,
};
use crate::balance::{BalanceController, BalanceMode};
use crate::body::BodyPartRegistry;
use crate::input::{FloorSensor, InputEvent, InputRouter, SensorSite};
use crate::math::floor_projection;
use crate::net::SessionMessage;
use crate::physics::{PhysicsState, PhysicsWorld, Ragdoll};
use crate::replication::{PoseInterpolator, PoseSnapshot, SnapshotSampler};
use crate::session::{CharacterId, ConnectionId, SessionTransport};
use crate::skeleton::{BoneId, BoneTransform, Skeleton};

use super::config::CharacterConfig;
use super::locomotion::Locomotion;
use super::role::Role;

/// One networked ragdoll. The same type runs on the authority and on observers;
/// `role` decides which half of each tick executes.
pub struct Character {
    id: CharacterId,
    owner: ConnectionId,
    name: String,
    role: Role,
    owned: bool,
    config: CharacterConfig,

    /// Pose of the rigid bodies on the authority, interpolated pose on observers.
    physical: Skeleton,
    /// Pose the animator and IK write into. Its locals drive the joint motors.
    animated: Skeleton,
    body_parts: BodyPartRegistry,
    balance: BalanceController,
    ik: IkBlender,
    animator: Animator,
    joint_targets: JointTargets,
    locomotion: Locomotion,
    ragdoll: Ragdoll,

    sampler: SnapshotSampler,
    interpolator: PoseInterpolator,
    floor_sensor: FloorSensor,
    input: InputRouter,

    on_floor: bool,
    movement_enabled: bool,
    ticks: u64,
}

impl Character {
    pub fn spawn(
        id: CharacterId,
        owner: ConnectionId,
        name: impl Into<String>,
        position: Vec3,
        config: CharacterConfig,
        world: &mut PhysicsWorld,
        transport: &dyn SessionTransport,
    ) -> Self {
        let name = name.into();
        let role = Role::resolve(transport, id, owner);
        let owned = transport.local_connection() == owner;

        let physical = Skeleton::humanoid(BoneTransform::new(position, Quat::IDENTITY));
        let animated = physical.clone();
        let joint_targets = JointTargets::capture(&animated);

        let state = PhysicsState::for_role(role, &config.physics);
        let ragdoll = Ragdoll::build(world, &physical, state, config.physics.joint_drive);

        log::info!(
            "Spawned character {} '{}' for connection {} as {}",
            id,
            name,
            owner,
            role
        );

        Self {
            id,
            owner,
            name,
            role,
            owned,
            physical,
            animated,
            body_parts: BodyPartRegistry::humanoid(),
            balance: BalanceController::new(config.balance.clone(), role.is_authority()),
            ik: IkBlender::new(config.ik.clone(), Some(IkRig::humanoid())),
            animator: Animator::default(),
            joint_targets,
            locomotion: Locomotion::new(config.locomotion.clone()),
            ragdoll,
            sampler: SnapshotSampler::new(config.replication.update_rate),
            interpolator: PoseInterpolator::new(&config.replication),
            floor_sensor: FloorSensor::new(config.floor.clone()),
            input: InputRouter::new(owned),
            on_floor: true,
            movement_enabled: true,
            ticks: 0,
            config,
        }
    }

    pub fn id(&self) -> CharacterId {
        self.id
    }

    pub fn owner(&self) -> ConnectionId {
        self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_owned(&self) -> bool {
        self.owned
    }

    pub fn config(&self) -> &CharacterConfig {
        &self.config
    }

    pub fn physical(&self) -> &Skeleton {
        &self.physical
    }

    pub fn animated(&self) -> &Skeleton {
        &self.animated
    }

    pub fn body_parts(&self) -> &BodyPartRegistry {
        &self.body_parts
    }

    pub fn balance(&self) -> &BalanceController {
        &self.balance
    }

    pub fn balance_mode(&self) -> BalanceMode {
        self.balance.mode()
    }

    pub fn ik(&self) -> &IkBlender {
        &self.ik
    }

    pub fn animator(&self) -> &Animator {
        &self.animator
    }

    pub fn locomotion(&self) -> &Locomotion {
        &self.locomotion
    }

    pub fn ragdoll(&self) -> &Ragdoll {
        &self.ragdoll
    }

    pub fn interpolator(&self) -> &PoseInterpolator {
        &self.interpolator
    }

    pub fn snapshots_sent(&self) -> u64 {
        self.sampler.sent()
    }

    pub fn snapshots_received(&self) -> u64 {
        self.interpolator.ring().received()
    }

    pub fn input(&self) -> &InputRouter {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputRouter {
        &mut self.input
    }

    /// Floor contact as last reported. Cosmetic on observers.
    pub fn is_on_floor(&self) -> bool {
        self.on_floor
    }

    pub fn movement_enabled(&self) -> bool {
        self.movement_enabled
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn torso_position(&self) -> Vec3 {
        self.physical.world(BoneId::Torso).position
    }

    /// Control half of a fixed tick, run before the physics step.
    pub fn fixed_tick(&mut self, world: &mut PhysicsWorld, dt: f32) {
        self.ticks += 1;
        match self.role {
            Role::Authority => self.simulate(world, dt),
            Role::OwnerObserver | Role::RemoteObserver => self.interpolate(world, dt),
        }
    }

    /// Read-back half of a fixed tick, run after the physics step.
    pub fn post_step(
        &mut self,
        world: &mut PhysicsWorld,
        transport: &mut dyn SessionTransport,
        dt: f32,
    ) {
        if self.role.is_authority() {
            self.ragdoll.clamp_velocities(world);
            self.ragdoll.read_pose(world, &mut self.physical);
            self.sync_animated_anchor();
        }

        self.sense_floor(world, transport);

        if !self.role.is_authority() {
            return;
        }
        if let Some(snapshot) = self.sampler.advance(&self.physical, dt) {
            transport.broadcast_to_observers(SessionMessage::pose(self.id, &snapshot));
        }
    }

    fn simulate(&mut self, world: &mut PhysicsWorld, dt: f32) {
        self.animator.sample(&mut self.animated, dt);
        self.ik.tick(&mut self.animated);
        self.joint_targets.update(&self.animated);
        self.ragdoll
            .drive_joints(world, &self.joint_targets, &self.body_parts);

        let torso = self.ragdoll.torso_state(world);
        let Some(mut command) = self.balance.tick(&torso, dt) else {
            return;
        };
        command.force +=
            self.locomotion.acceleration(torso.linear_velocity, dt) * BoneId::Torso.mass();
        self.ragdoll.apply_command(world, &command);
    }

    fn interpolate(&mut self, world: &mut PhysicsWorld, dt: f32) {
        if self.interpolator.apply(&mut self.physical, dt) {
            self.physical.fit_anchor(BoneId::Torso);
            self.physical.refresh_locals();
        }
        self.ragdoll.follow_pose(world, &self.physical);

        self.sync_animated_anchor();
        self.animator.sample(&mut self.animated, dt);
    }

    fn sync_animated_anchor(&mut self) {
        let torso = self.physical.world(BoneId::Torso);
        let animated_torso = self.animated.world(BoneId::Torso);
        let anchor = self.animated.anchor();
        self.animated.set_anchor(BoneTransform::new(
            torso.position + (anchor.position - animated_torso.position),
            torso.rotation,
        ));
        self.animated.solve_world();
    }

    fn senses_floor(&self) -> bool {
        match self.config.floor.site {
            SensorSite::Authority => self.role.is_authority(),
            SensorSite::Owner => self.owned,
        }
    }

    fn sense_floor(&mut self, world: &PhysicsWorld, transport: &mut dyn SessionTransport) {
        if !self.senses_floor() {
            return;
        }
        let [left, right] = self
            .ragdoll
            .probe_feet(world, self.config.floor.detection_distance);
        let Some(on_floor) = self.floor_sensor.update(left, right) else {
            return;
        };

        if self.role.is_authority() {
            self.on_floor_changed(on_floor, transport);
        } else {
            transport.send_to_authority(SessionMessage::FloorChanged {
                character: self.id,
                on_floor,
            });
        }
    }

    /// Latest owner input. Aim and facing update even when `movement` is zero.
    pub fn handle_move_input(
        &mut self,
        movement: Vec2,
        aim_direction: Vec3,
        transport: &mut dyn SessionTransport,
    ) {
        if !self.role.is_authority() {
            log::debug!("Ignoring move input for character {} off-authority", self.id);
            return;
        }

        self.ik.set_aim_direction(aim_direction);
        let facing = floor_projection(self.ik.aim_direction());
        self.balance.set_target_direction(facing);
        self.balance.set_manual_torque_input(movement);

        let params = self
            .locomotion
            .set_input(movement, facing, self.movement_enabled);
        self.set_movement(params.moving, params.speed, params.forward_speed, transport);
    }

    fn set_movement(
        &mut self,
        moving: bool,
        speed: f32,
        forward_speed: f32,
        transport: &mut dyn SessionTransport,
    ) {
        if self.animator.set_movement(moving, speed, forward_speed) {
            transport.broadcast_to_observers(SessionMessage::MovementState {
                character: self.id,
                moving,
                speed,
                forward_speed,
            });
        }
    }

    /// Floor contact transition. Drives balance and movement on the authority and
    /// only updates the cosmetic cue elsewhere.
    pub fn on_floor_changed(&mut self, on_floor: bool, transport: &mut dyn SessionTransport) {
        if !self.role.is_authority() {
            self.on_floor = on_floor;
            return;
        }
        if on_floor == self.on_floor {
            log::debug!(
                "Character {} floor contact already {}, ignoring",
                self.id,
                on_floor
            );
            return;
        }
        self.on_floor = on_floor;
        self.balance.on_floor_changed(on_floor, &mut self.body_parts);

        self.movement_enabled = on_floor;
        if on_floor {
            self.play_animation(IDLE_CLIP, 1.0, transport);
        } else {
            self.locomotion.stop();
            self.set_movement(false, 0.0, 0.0, transport);
            self.play_animation(IN_THE_AIR_CLIP, 1.0, transport);
        }

        transport.broadcast_to_observers(SessionMessage::FloorChanged {
            character: self.id,
            on_floor,
        });
        log::debug!(
            "Character {} {} floor, balance mode {}",
            self.id,
            if on_floor { "landed on" } else { "left" },
            self.balance.mode()
        );
    }

    /// Switches clip locally and mirrors it. The authority fans out to observers, the
    /// owner asks the authority to do so.
    pub fn play_animation(&mut self, clip: &str, speed: f32, transport: &mut dyn SessionTransport) {
        self.animator.play(clip, speed);
        let event = SessionMessage::AnimationEvent {
            character: self.id,
            clip: clip.to_string(),
            speed,
        };
        match self.role {
            Role::Authority => transport.broadcast_to_observers(event),
            Role::OwnerObserver => transport.send_to_authority(event),
            Role::RemoteObserver => {}
        }
    }

    /// Mirrored clip change. Applying the same event twice is harmless.
    pub fn apply_animation_event(&mut self, clip: &str, speed: f32) {
        self.animator.play(clip, speed);
    }

    pub fn apply_movement_state(&mut self, moving: bool, speed: f32, forward_speed: f32) {
        if self.role.is_authority() {
            return;
        }
        self.animator.set_movement(moving, speed, forward_speed);
    }

    /// Applies locally and forwards to the authority. No-op while IK is disabled.
    pub fn set_arm_weight(
        &mut self,
        side: ArmSide,
        weight: f32,
        transport: &mut dyn SessionTransport,
    ) {
        if !self.ik.is_enabled() {
            return;
        }
        self.ik.set_arm_weight(side, weight);
        if !self.role.is_authority() {
            transport.send_to_authority(SessionMessage::ArmWeight {
                character: self.id,
                side,
                weight: self.ik.arm_weight(side),
            });
        }
    }

    /// Flushes this frame's owner input. Returns how many events were routed.
    pub fn send_input(&mut self, aim_direction: Vec3, transport: &mut dyn SessionTransport) -> usize {
        let events = self.input.frame(aim_direction);
        let count = events.len();
        for event in events {
            match event {
                InputEvent::Arm { side, weight } => self.set_arm_weight(side, weight, transport),
                InputEvent::Move {
                    movement,
                    aim_direction,
                } => {
                    if self.role.is_authority() {
                        self.handle_move_input(movement, aim_direction, transport);
                    } else {
                        transport.send_to_authority(SessionMessage::move_input(
                            self.id,
                            movement,
                            aim_direction,
                        ));
                    }
                }
            }
        }
        count
    }

    pub fn apply_snapshot(&mut self, snapshot: PoseSnapshot) -> bool {
        if self.role.is_authority() {
            log::debug!("Authority ignoring snapshot for its own character {}", self.id);
            return false;
        }
        self.interpolator.receive(snapshot)
    }

    /// Removes every physics object of this character. No more snapshots follow.
    pub fn teardown(self, world: &mut PhysicsWorld) {
        log::info!("Despawned character {} '{}'", self.id, self.name);
        self.ragdoll.teardown(world);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{HEAD_NECK, LEFT_LEG, RIGHT_LEG};
    use crate::physics::PhysicsConfig;
    use crate::session::{Outbox, Recipient};

    const DT: f32 = 1.0 / 60.0;

    fn world() -> PhysicsWorld {
        let config = PhysicsConfig::default();
        let mut world = PhysicsWorld::new(&config, DT);
        world.add_ground(0.0, config.ground_half_size);
        world
    }

    fn spawn(world: &mut PhysicsWorld, transport: &Outbox, owner: ConnectionId) -> Character {
        Character::spawn(
            1,
            owner,
            "Tester",
            Vec3::ZERO,
            CharacterConfig::default(),
            world,
            transport,
        )
    }

    fn tick(character: &mut Character, world: &mut PhysicsWorld, outbox: &mut Outbox) {
        character.fixed_tick(world, DT);
        world.step();
        character.post_step(world, outbox, DT);
    }

    fn strength(character: &Character, name: &str) -> f32 {
        character
            .body_parts()
            .get(name)
            .map_or(f32::NAN, |p| p.strength())
    }

    #[test]
    fn leaving_floor_loosens_and_disables_movement() {
        let mut world = world();
        let mut outbox = Outbox::host();
        let mut character = spawn(&mut world, &outbox, 5);
        assert_eq!(character.role(), Role::Authority);

        character.on_floor_changed(false, &mut outbox);

        assert_eq!(character.balance_mode(), BalanceMode::ManualTorque);
        assert!((strength(&character, HEAD_NECK) - 0.1).abs() < 1e-6);
        assert!((strength(&character, LEFT_LEG) - 0.05).abs() < 1e-6);
        assert!((strength(&character, RIGHT_LEG) - 0.05).abs() < 1e-6);
        assert!(!character.movement_enabled());
        assert_eq!(character.animator().clip(), IN_THE_AIR_CLIP);

        let sent: Vec<_> = outbox.drain().collect();
        assert!(sent.iter().all(|(to, _)| *to == Recipient::Observers));
        assert!(sent.iter().any(|(_, m)| matches!(
            m,
            SessionMessage::AnimationEvent { clip, .. } if clip == IN_THE_AIR_CLIP
        )));
        assert!(sent.iter().any(|(_, m)| matches!(
            m,
            SessionMessage::FloorChanged { on_floor: false, .. }
        )));
    }

    #[test]
    fn landing_restores_strength_and_stabilizer() {
        let mut world = world();
        let mut outbox = Outbox::host();
        let mut character = spawn(&mut world, &outbox, 5);

        character.on_floor_changed(false, &mut outbox);
        character.on_floor_changed(true, &mut outbox);

        assert_eq!(character.balance_mode(), BalanceMode::StabilizerJoint);
        for name in [HEAD_NECK, LEFT_LEG, RIGHT_LEG] {
            assert_eq!(strength(&character, name), 1.0);
        }
        assert!(character.movement_enabled());
        assert_eq!(character.animator().clip(), IDLE_CLIP);
    }

    #[test]
    fn move_input_faces_and_accelerates_forward() {
        let mut world = world();
        let mut outbox = Outbox::host();
        let mut character = spawn(&mut world, &outbox, 5);

        character.handle_move_input(Vec2::new(0.0, 1.0), Vec3::Z, &mut outbox);

        assert!((character.balance().target_direction() - Vec3::Z).length() < 1e-6);
        assert!(character.animator().is_moving());
        assert_eq!(character.animator().forward_speed(), 1.0);
        assert!(outbox.drain().any(|(_, m)| matches!(
            m,
            SessionMessage::MovementState { moving: true, .. }
        )));

        for _ in 0..10 {
            tick(&mut character, &mut world, &mut outbox);
        }
        let torso = character.ragdoll().torso_state(&world);
        assert!(torso.linear_velocity.z > 0.1, "torso velocity {}", torso.linear_velocity);
        assert!(torso.linear_velocity.z <= 5.5);
    }

    #[test]
    fn airborne_move_input_keeps_facing_but_not_speed() {
        let mut world = world();
        let mut outbox = Outbox::host();
        let mut character = spawn(&mut world, &outbox, 5);
        character.on_floor_changed(false, &mut outbox);

        character.handle_move_input(Vec2::new(0.0, 1.0), Vec3::X, &mut outbox);

        assert!((character.balance().target_direction() - Vec3::X).length() < 1e-6);
        assert!(!character.animator().is_moving());
        assert_eq!(character.locomotion().target_velocity(), Vec3::ZERO);
    }

    #[test]
    fn owner_forwards_input_to_authority() {
        let mut world = world();
        let mut outbox = Outbox::new(5);
        let mut character = spawn(&mut world, &outbox, 5);
        assert_eq!(character.role(), Role::OwnerObserver);

        character.input_mut().capture_arm(ArmSide::Left, 0.5);
        character.input_mut().capture_move(Vec2::ZERO);
        assert_eq!(character.send_input(Vec3::Z, &mut outbox), 2);

        let sent: Vec<_> = outbox.drain().collect();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|(to, _)| *to == Recipient::Authority));
        assert!(matches!(
            sent[0].1,
            SessionMessage::ArmWeight { side: ArmSide::Left, .. }
        ));
        assert!(matches!(
            &sent[1].1,
            SessionMessage::MoveInput { movement, .. } if *movement == [0.0; 2]
        ));
        assert_eq!(character.ik().arm_weight(ArmSide::Left), 0.5);
    }

    #[test]
    fn remote_observer_has_no_input() {
        let mut world = world();
        let mut outbox = Outbox::new(6);
        let mut character = spawn(&mut world, &outbox, 5);
        assert_eq!(character.role(), Role::RemoteObserver);

        character.input_mut().capture_move(Vec2::Y);
        assert_eq!(character.send_input(Vec3::Z, &mut outbox), 0);
        character.handle_move_input(Vec2::Y, Vec3::X, &mut outbox);
        assert!(outbox.is_empty());
        assert!(!character.animator().is_moving());
    }

    #[test]
    fn authority_broadcasts_snapshots_at_update_rate() {
        let mut world = world();
        let mut outbox = Outbox::host();
        let mut character = spawn(&mut world, &outbox, 5);

        for _ in 0..60 {
            tick(&mut character, &mut world, &mut outbox);
        }
        let snapshots = outbox
            .drain()
            .filter(|(_, m)| matches!(m, SessionMessage::PoseSnapshot { .. }))
            .count();
        assert_eq!(snapshots, 15);
        assert_eq!(character.snapshots_sent(), 15);
    }

    #[test]
    fn observer_moves_towards_received_pose() {
        let mut world = world();
        let mut outbox = Outbox::new(6);
        let mut character = spawn(&mut world, &outbox, 5);

        let target = Skeleton::humanoid(BoneTransform::new(
            Vec3::new(1.0, 0.0, 0.0),
            Quat::IDENTITY,
        ));
        assert!(character.apply_snapshot(PoseSnapshot::sample(&target, 0.1)));

        let before = character.torso_position().distance(Vec3::new(1.0, 1.0, 0.0));
        for _ in 0..30 {
            tick(&mut character, &mut world, &mut outbox);
        }
        let after = character.torso_position().distance(Vec3::new(1.0, 1.0, 0.0));
        assert!(after < before * 0.1, "torso still {after} away");
        assert!(character.animated().anchor().position.x > 0.9);
    }

    #[test]
    fn authority_rejects_snapshots() {
        let mut world = world();
        let outbox = Outbox::host();
        let mut character = spawn(&mut world, &outbox, 5);
        let snapshot = PoseSnapshot::sample(character.physical(), 0.0);
        assert!(!character.apply_snapshot(snapshot));
    }

    #[test]
    fn arm_weight_is_ignored_without_ik() {
        let mut world = world();
        let mut outbox = Outbox::new(5);
        let mut config = CharacterConfig::default();
        config.ik.enable_ik = false;
        let mut character =
            Character::spawn(1, 5, "Tester", Vec3::ZERO, config, &mut world, &outbox);

        character.set_arm_weight(ArmSide::Right, 1.0, &mut outbox);
        assert!(outbox.is_empty());
        assert_eq!(character.ik().arm_weight(ArmSide::Right), 0.0);
    }

    #[test]
    fn teardown_removes_bodies() {
        let mut world = world();
        let outbox = Outbox::host();
        let before = world.body_count();
        let character = spawn(&mut world, &outbox, 5);
        assert!(world.body_count() > before);
        character.teardown(&mut world);
        assert_eq!(world.body_count(), before);
    }
}
