use std::collections::VecDeque;

use crate::net::SessionMessage;

use super::{ConnectionId, HOST_CONNECTION};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    Authority,
    /// Every connected observer.
    Observers,
    Connection(ConnectionId),
}

#[derive(Debug, Clone)]
pub struct Envelope {
    pub from: ConnectionId,
    pub message: SessionMessage,
}

/// What the character core needs from the session layer. Delivery is fire-and-forget.
pub trait SessionTransport {
    fn local_connection(&self) -> ConnectionId;

    fn is_authority(&self) -> bool;

    /// One host simulates every character.
    fn is_authority_for(&self, _character: super::CharacterId) -> bool {
        self.is_authority()
    }

    fn send(&mut self, recipient: Recipient, message: SessionMessage);

    fn send_to_authority(&mut self, message: SessionMessage) {
        self.send(Recipient::Authority, message);
    }

    fn broadcast_to_observers(&mut self, message: SessionMessage) {
        self.send(Recipient::Observers, message);
    }

    fn send_to(&mut self, connection: ConnectionId, message: SessionMessage) {
        self.send(Recipient::Connection(connection), message);
    }
}

/// Queues outgoing messages until the owning process flushes them onto a wire.
#[derive(Debug, Clone)]
pub struct Outbox {
    local: ConnectionId,
    queue: VecDeque<(Recipient, SessionMessage)>,
}

impl Outbox {
    pub fn host() -> Self {
        Self::new(HOST_CONNECTION)
    }

    pub fn new(local: ConnectionId) -> Self {
        Self {
            local,
            queue: VecDeque::new(),
        }
    }

    pub fn set_local_connection(&mut self, local: ConnectionId) {
        self.local = local;
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = (Recipient, SessionMessage)> + '_ {
        self.queue.drain(..)
    }
}

impl SessionTransport for Outbox {
    fn local_connection(&self) -> ConnectionId {
        self.local
    }

    fn is_authority(&self) -> bool {
        self.local == HOST_CONNECTION
    }

    fn send(&mut self, recipient: Recipient, message: SessionMessage) {
        self.queue.push_back((recipient, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbox_keeps_send_order() {
        let mut outbox = Outbox::new(3);
        assert!(!outbox.is_authority());
        outbox.send_to_authority(SessionMessage::CharacterDespawned { character: 1 });
        outbox.broadcast_to_observers(SessionMessage::CharacterDespawned { character: 2 });

        let sent: Vec<_> = outbox.drain().collect();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, Recipient::Authority);
        assert_eq!(sent[1].0, Recipient::Observers);
        assert!(outbox.is_empty());
    }

    #[test]
    fn host_outbox_is_authority() {
        let outbox = Outbox::host();
        assert!(outbox.is_authority());
        assert!(outbox.is_authority_for(7));
    }
}
