use std::collections::BTreeMap;

use glam::{Vec2, Vec3};

use crate::animation::ArmSide;
use crate::character::{Character, CharacterConfig};
use crate::error::ConfigError;
use crate::net::{SessionMessage, decode_pose};
use crate::physics::PhysicsWorld;
use crate::session::{CharacterId, ConnectionId, Outbox, Recipient, SessionTransport};

use super::arena;
use super::tick::FixedTimestep;

/// A client's view of a session: every character is rendered from snapshots and
/// the owned one also captures and forwards input.
pub struct ObserverSimulation {
    config: CharacterConfig,
    world: PhysicsWorld,
    timestep: FixedTimestep,
    characters: BTreeMap<CharacterId, Character>,
    owned: Option<CharacterId>,
    outbox: Outbox,
    ticks: u64,
    ignored: u64,
}

impl ObserverSimulation {
    pub fn new(
        config: CharacterConfig,
        tick_rate: u32,
        local: ConnectionId,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let timestep = FixedTimestep::new(tick_rate);
        let world = arena(&config.physics, timestep.dt());
        Ok(Self {
            config,
            world,
            timestep,
            characters: BTreeMap::new(),
            owned: None,
            outbox: Outbox::new(local),
            ticks: 0,
            ignored: 0,
        })
    }

    pub fn local_connection(&self) -> ConnectionId {
        self.outbox.local_connection()
    }

    /// Rebinds the local connection once the handshake assigned one. Characters that
    /// already exist keep the role they were spawned with.
    pub fn set_local_connection(&mut self, local: ConnectionId) {
        self.outbox.set_local_connection(local);
    }

    pub fn tick(&self) -> u64 {
        self.ticks
    }

    pub fn dt(&self) -> f32 {
        self.timestep.dt()
    }

    pub fn characters(&self) -> impl Iterator<Item = &Character> {
        self.characters.values()
    }

    pub fn character(&self, id: CharacterId) -> Option<&Character> {
        self.characters.get(&id)
    }

    pub fn character_count(&self) -> usize {
        self.characters.len()
    }

    pub fn owned_id(&self) -> Option<CharacterId> {
        self.owned
    }

    pub fn owned(&self) -> Option<&Character> {
        self.owned.and_then(|id| self.characters.get(&id))
    }

    pub fn owned_mut(&mut self) -> Option<&mut Character> {
        self.owned.and_then(|id| self.characters.get_mut(&id))
    }

    /// Messages that were not applicable on an observer.
    pub fn ignored(&self) -> u64 {
        self.ignored
    }

    pub fn outbox_mut(&mut self) -> &mut Outbox {
        &mut self.outbox
    }

    pub fn drain_outgoing(&mut self) -> Vec<(Recipient, SessionMessage)> {
        self.outbox.drain().collect()
    }

    /// Applies one message from the authority. Returns whether it changed anything.
    pub fn handle_message(&mut self, message: SessionMessage) -> bool {
        let id = message.character();
        let applied = match message {
            SessionMessage::CharacterSpawned {
                owner,
                name,
                position,
                ..
            } => self.spawn(id, owner, name, Vec3::from_array(position)),
            SessionMessage::CharacterDespawned { .. } => self.despawn(id),
            SessionMessage::PoseSnapshot {
                positions,
                rotations,
                timestamp,
                ..
            } => self.characters.get_mut(&id).is_some_and(|character| {
                character.apply_snapshot(decode_pose(&positions, &rotations, timestamp))
            }),
            SessionMessage::AnimationEvent { clip, speed, .. } => {
                self.characters.get_mut(&id).is_some_and(|character| {
                    character.apply_animation_event(&clip, speed);
                    true
                })
            }
            SessionMessage::MovementState {
                moving,
                speed,
                forward_speed,
                ..
            } => self.characters.get_mut(&id).is_some_and(|character| {
                character.apply_movement_state(moving, speed, forward_speed);
                true
            }),
            SessionMessage::FloorChanged { on_floor, .. } => {
                match self.characters.get_mut(&id) {
                    Some(character) => {
                        character.on_floor_changed(on_floor, &mut self.outbox);
                        true
                    }
                    None => false,
                }
            }
            SessionMessage::MoveInput { .. } | SessionMessage::ArmWeight { .. } => {
                log::debug!("Observer ignoring authority-bound message for {}", id);
                false
            }
        };
        if !applied {
            self.ignored += 1;
        }
        applied
    }

    fn spawn(&mut self, id: CharacterId, owner: ConnectionId, name: String, position: Vec3) -> bool {
        if self.characters.contains_key(&id) {
            return false;
        }
        let character = Character::spawn(
            id,
            owner,
            name,
            position,
            self.config.clone(),
            &mut self.world,
            &self.outbox,
        );
        if character.is_owned() {
            self.owned = Some(id);
        }
        self.characters.insert(id, character);
        true
    }

    fn despawn(&mut self, id: CharacterId) -> bool {
        let Some(character) = self.characters.remove(&id) else {
            return false;
        };
        character.teardown(&mut self.world);
        if self.owned == Some(id) {
            self.owned = None;
        }
        true
    }

    /// Stores this frame's movement for the owned character.
    pub fn capture_move(&mut self, movement: Vec2) {
        if let Some(character) = self.owned_mut() {
            character.input_mut().capture_move(movement);
        }
    }

    pub fn capture_arm(&mut self, side: ArmSide, weight: f32) {
        if let Some(character) = self.owned_mut() {
            character.input_mut().capture_arm(side, weight);
        }
    }

    /// Flushes owner input towards the authority. Called once per input frame.
    pub fn send_input(&mut self, aim_direction: Vec3) -> usize {
        let Some(id) = self.owned else {
            return 0;
        };
        match self.characters.get_mut(&id) {
            Some(character) => character.send_input(aim_direction, &mut self.outbox),
            None => 0,
        }
    }

    pub fn update(&mut self, delta: f32) -> u32 {
        let due = self.timestep.advance(delta);
        for _ in 0..due {
            self.fixed_tick();
        }
        due
    }

    /// Interpolates every character, steps the kinematic copies and runs the
    /// owner-side floor sensor.
    pub fn fixed_tick(&mut self) {
        self.ticks += 1;
        let dt = self.timestep.dt();
        for character in self.characters.values_mut() {
            character.fixed_tick(&mut self.world, dt);
        }
        self.world.step();
        for character in self.characters.values_mut() {
            character.post_step(&mut self.world, &mut self.outbox, dt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::IN_THE_AIR_CLIP;
    use crate::character::Role;
    use crate::replication::PoseSnapshot;
    use crate::skeleton::Skeleton;

    fn observer(local: ConnectionId) -> ObserverSimulation {
        ObserverSimulation::new(CharacterConfig::default(), 60, local).expect("valid config")
    }

    fn spawned(character: CharacterId, owner: ConnectionId) -> SessionMessage {
        SessionMessage::CharacterSpawned {
            character,
            owner,
            name: format!("Player {owner}"),
            position: [0.0; 3],
        }
    }

    #[test]
    fn spawn_resolves_roles() {
        let mut sim = observer(2);
        assert!(sim.handle_message(spawned(1, 1)));
        assert!(sim.handle_message(spawned(2, 2)));
        assert!(!sim.handle_message(spawned(2, 2)));

        assert_eq!(sim.character(1).map(|c| c.role()), Some(Role::RemoteObserver));
        assert_eq!(sim.character(2).map(|c| c.role()), Some(Role::OwnerObserver));
        assert_eq!(sim.owned_id(), Some(2));
    }

    #[test]
    fn despawn_drops_owned_character() {
        let mut sim = observer(2);
        sim.handle_message(spawned(7, 2));
        assert!(sim.handle_message(SessionMessage::CharacterDespawned { character: 7 }));
        assert_eq!(sim.owned_id(), None);
        assert_eq!(sim.character_count(), 0);
        assert_eq!(sim.send_input(Vec3::Z), 0);
    }

    #[test]
    fn snapshots_for_unknown_characters_are_ignored() {
        let mut sim = observer(2);
        let snapshot = PoseSnapshot::sample(&Skeleton::default(), 0.1);
        assert!(!sim.handle_message(SessionMessage::pose(9, &snapshot)));
        assert_eq!(sim.ignored(), 1);
    }

    #[test]
    fn mirrored_events_apply_to_remote_characters() {
        let mut sim = observer(2);
        sim.handle_message(spawned(1, 1));

        let event = SessionMessage::AnimationEvent {
            character: 1,
            clip: IN_THE_AIR_CLIP.to_string(),
            speed: 1.0,
        };
        assert!(sim.handle_message(event.clone()));
        assert!(sim.handle_message(event));
        assert!(sim.handle_message(SessionMessage::FloorChanged {
            character: 1,
            on_floor: false
        }));

        let character = sim.character(1).expect("character");
        assert_eq!(character.animator().clip(), IN_THE_AIR_CLIP);
        assert!(!character.is_on_floor());
        assert!(sim.drain_outgoing().is_empty());
    }

    #[test]
    fn owned_input_goes_to_authority() {
        let mut sim = observer(2);
        sim.handle_message(spawned(3, 2));
        sim.capture_arm(ArmSide::Right, 2.0);
        sim.capture_move(Vec2::new(0.0, 1.0));
        assert_eq!(sim.send_input(Vec3::Z), 2);

        let sent = sim.drain_outgoing();
        assert!(sent.iter().all(|(to, _)| *to == Recipient::Authority));
        assert!(matches!(
            &sent[0].1,
            SessionMessage::ArmWeight { weight, .. } if *weight == 1.0
        ));
        assert!(matches!(&sent[1].1, SessionMessage::MoveInput { character: 3, .. }));
    }

    #[test]
    fn every_frame_sends_move_even_when_idle() {
        let mut sim = observer(2);
        sim.handle_message(spawned(3, 2));
        for _ in 0..3 {
            assert_eq!(sim.send_input(Vec3::X), 1);
        }
        assert_eq!(sim.drain_outgoing().len(), 3);
    }
}
