use std::collections::{BTreeMap, HashMap};

use glam::{Vec2, Vec3};

use crate::character::{Character, CharacterConfig};
use crate::error::{ConfigError, SessionError};
use crate::net::SessionMessage;
use crate::physics::PhysicsWorld;
use crate::session::{
    CharacterId, ConnectionId, Envelope, IdentityRegistry, Outbox, PlayerIdentity, Recipient,
    SessionTransport,
};

use super::tick::FixedTimestep;
use super::{arena, spawn_position};

/// The authoritative side of a session: one physics world, one character per
/// connection, fed by owner messages and emitting snapshots into its outbox.
pub struct HostSimulation {
    config: CharacterConfig,
    world: PhysicsWorld,
    timestep: FixedTimestep,
    characters: BTreeMap<CharacterId, Character>,
    by_owner: HashMap<ConnectionId, CharacterId>,
    identities: IdentityRegistry,
    outbox: Outbox,
    next_character: CharacterId,
    spawned: u32,
    rejected: u64,
    ticks: u64,
}

impl HostSimulation {
    pub fn new(config: CharacterConfig, tick_rate: u32) -> Result<Self, ConfigError> {
        config.validate()?;
        let timestep = FixedTimestep::new(tick_rate);
        let world = arena(&config.physics, timestep.dt());
        Ok(Self {
            config,
            world,
            timestep,
            characters: BTreeMap::new(),
            by_owner: HashMap::new(),
            identities: IdentityRegistry::new(),
            outbox: Outbox::host(),
            next_character: 1,
            spawned: 0,
            rejected: 0,
            ticks: 0,
        })
    }

    pub fn config(&self) -> &CharacterConfig {
        &self.config
    }

    pub fn world(&self) -> &PhysicsWorld {
        &self.world
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

    pub fn character_of(&self, owner: ConnectionId) -> Option<CharacterId> {
        self.by_owner.get(&owner).copied()
    }

    pub fn character_count(&self) -> usize {
        self.characters.len()
    }

    /// Messages rejected for ownership or authority reasons.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn outbox_mut(&mut self) -> &mut Outbox {
        &mut self.outbox
    }

    pub fn drain_outgoing(&mut self) -> Vec<(Recipient, SessionMessage)> {
        self.outbox.drain().collect()
    }

    /// Creates the character for a newly connected player, announces it to every
    /// observer and catches the newcomer up on characters that already exist.
    pub fn spawn(&mut self, owner: ConnectionId, name: &str) -> Result<CharacterId, SessionError> {
        if self.by_owner.contains_key(&owner) {
            return Err(SessionError::AlreadySpawned(owner));
        }
        self.identities.register(owner, name);
        let label = self.identities.label(owner);

        for existing in self.characters.values() {
            self.outbox.send_to(owner, spawned_message(existing));
        }

        let id = self.next_character;
        self.next_character += 1;
        let position = spawn_position(self.spawned);
        self.spawned += 1;

        let character = Character::spawn(
            id,
            owner,
            label,
            position,
            self.config.clone(),
            &mut self.world,
            &self.outbox,
        );
        self.outbox.broadcast_to_observers(spawned_message(&character));
        self.characters.insert(id, character);
        self.by_owner.insert(owner, id);
        Ok(id)
    }

    /// Tears down the character of a departed connection. Its snapshots stop with it.
    pub fn despawn_owner(&mut self, owner: ConnectionId) -> Option<CharacterId> {
        let id = self.by_owner.remove(&owner)?;
        self.identities.remove(owner);
        self.remove_character(id);
        Some(id)
    }

    fn remove_character(&mut self, id: CharacterId) {
        if let Some(character) = self.characters.remove(&id) {
            character.teardown(&mut self.world);
            self.outbox
                .broadcast_to_observers(SessionMessage::CharacterDespawned { character: id });
        }
    }

    /// Applies one owner request. Anything from a connection that does not own the
    /// character, or that only the authority may send, is rejected and logged.
    pub fn handle_message(&mut self, envelope: Envelope) -> Result<(), SessionError> {
        let Envelope { from, message } = envelope;
        let id = message.character();

        let result = self.dispatch(from, id, message);
        if let Err(err) = &result {
            self.rejected += 1;
            log::warn!("Rejected message from connection {}: {}", from, err);
        }
        result
    }

    fn dispatch(
        &mut self,
        from: ConnectionId,
        id: CharacterId,
        message: SessionMessage,
    ) -> Result<(), SessionError> {
        let character = self
            .characters
            .get_mut(&id)
            .ok_or(SessionError::UnknownCharacter(id))?;
        let owner_only = matches!(
            message,
            SessionMessage::MoveInput { .. }
                | SessionMessage::ArmWeight { .. }
                | SessionMessage::FloorChanged { .. }
                | SessionMessage::AnimationEvent { .. }
        );
        if owner_only && character.owner() != from {
            return Err(SessionError::NotOwner {
                connection: from,
                character: id,
            });
        }

        match message {
            SessionMessage::MoveInput {
                movement,
                aim_direction,
                ..
            } => character.handle_move_input(
                Vec2::from_array(movement),
                Vec3::from_array(aim_direction),
                &mut self.outbox,
            ),
            SessionMessage::ArmWeight { side, weight, .. } => {
                character.set_arm_weight(side, weight, &mut self.outbox)
            }
            SessionMessage::FloorChanged { on_floor, .. } => {
                character.on_floor_changed(on_floor, &mut self.outbox)
            }
            SessionMessage::AnimationEvent { clip, speed, .. } => {
                character.play_animation(&clip, speed, &mut self.outbox)
            }
            other => return Err(SessionError::NotAuthority(other.kind())),
        }
        Ok(())
    }

    /// Runs as many fixed ticks as `delta` covers. Returns how many ran.
    pub fn update(&mut self, delta: f32) -> u32 {
        let due = self.timestep.advance(delta);
        for _ in 0..due {
            self.fixed_tick();
        }
        due
    }

    /// One fixed tick: control for every character, a single physics step, then
    /// read-back and snapshot sampling.
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

fn spawned_message(character: &Character) -> SessionMessage {
    SessionMessage::CharacterSpawned {
        character: character.id(),
        owner: character.owner(),
        name: character.name().to_string(),
        position: character.physical().anchor().position.to_array(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::ArmSide;
    use crate::balance::BalanceMode;

    fn host() -> HostSimulation {
        HostSimulation::new(CharacterConfig::default(), 60).expect("valid config")
    }

    fn envelope(from: ConnectionId, message: SessionMessage) -> Envelope {
        Envelope { from, message }
    }

    #[test]
    fn spawn_announces_and_catches_up() {
        let mut host = host();
        let first = host.spawn(1, "Ada").expect("first spawn");
        let sent = host.drain_outgoing();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, Recipient::Observers);

        let second = host.spawn(2, "").expect("second spawn");
        assert_ne!(first, second);
        let sent = host.drain_outgoing();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, Recipient::Connection(2));
        assert!(matches!(
            &sent[0].1,
            SessionMessage::CharacterSpawned { character, name, .. }
                if *character == first && name == "Ada"
        ));
        assert_eq!(host.character(second).map(|c| c.name()), Some("Player 2"));
    }

    #[test]
    fn second_spawn_for_same_connection_fails() {
        let mut host = host();
        host.spawn(1, "Ada").expect("first spawn");
        assert_eq!(host.spawn(1, "Ada"), Err(SessionError::AlreadySpawned(1)));
    }

    #[test]
    fn rejects_input_from_non_owner() {
        let mut host = host();
        let id = host.spawn(1, "Ada").expect("spawn");
        host.drain_outgoing();

        let message = SessionMessage::move_input(id, Vec2::Y, Vec3::Z);
        let result = host.handle_message(envelope(2, message));
        assert_eq!(
            result,
            Err(SessionError::NotOwner {
                connection: 2,
                character: id
            })
        );
        assert_eq!(host.rejected(), 1);
        assert!(host.character(id).is_some_and(|c| !c.animator().is_moving()));
    }

    #[test]
    fn rejects_authority_only_messages() {
        let mut host = host();
        let id = host.spawn(1, "Ada").expect("spawn");
        let message = SessionMessage::CharacterDespawned { character: id };
        assert_eq!(
            host.handle_message(envelope(1, message)),
            Err(SessionError::NotAuthority("CharacterDespawned"))
        );
        assert!(host.character(id).is_some());
    }

    #[test]
    fn unknown_character_is_an_error() {
        let mut host = host();
        let message = SessionMessage::FloorChanged {
            character: 42,
            on_floor: false,
        };
        assert_eq!(
            host.handle_message(envelope(1, message)),
            Err(SessionError::UnknownCharacter(42))
        );
    }

    #[test]
    fn owner_messages_reach_the_character() {
        let mut host = host();
        let id = host.spawn(1, "Ada").expect("spawn");

        let arm = SessionMessage::ArmWeight {
            character: id,
            side: ArmSide::Right,
            weight: 0.75,
        };
        host.handle_message(envelope(1, arm)).expect("arm weight");
        let floor = SessionMessage::FloorChanged {
            character: id,
            on_floor: false,
        };
        host.handle_message(envelope(1, floor)).expect("floor change");

        let character = host.character(id).expect("character");
        assert_eq!(character.ik().arm_weight(ArmSide::Right), 0.75);
        assert_eq!(character.balance_mode(), BalanceMode::ManualTorque);
    }

    #[test]
    fn despawn_tears_down_and_announces() {
        let mut host = host();
        let bodies = host.world().body_count();
        let id = host.spawn(1, "Ada").expect("spawn");
        host.drain_outgoing();

        assert_eq!(host.despawn_owner(1), Some(id));
        assert_eq!(host.world().body_count(), bodies);
        assert_eq!(host.character_count(), 0);
        let sent = host.drain_outgoing();
        assert!(matches!(
            sent.as_slice(),
            [(Recipient::Observers, SessionMessage::CharacterDespawned { .. })]
        ));
        assert_eq!(host.despawn_owner(1), None);
    }

    #[test]
    fn fixed_ticks_emit_snapshots_per_character() {
        let mut host = host();
        host.spawn(1, "Ada").expect("spawn");
        host.spawn(2, "Bob").expect("spawn");
        host.drain_outgoing();

        for _ in 0..12 {
            host.fixed_tick();
        }
        assert_eq!(host.tick(), 12);
        let snapshots = host
            .drain_outgoing()
            .into_iter()
            .filter(|(_, m)| matches!(m, SessionMessage::PoseSnapshot { .. }))
            .count();
        assert_eq!(snapshots, 6);
    }
}
