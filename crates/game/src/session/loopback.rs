use std::collections::{BTreeMap, VecDeque};

use super::transport::{Envelope, Outbox, Recipient, SessionTransport};
use super::{ConnectionId, HOST_CONNECTION};

/// In-memory session hub connecting one host and any number of clients inside a
/// single process.
#[derive(Debug, Default)]
pub struct LoopbackNetwork {
    inboxes: BTreeMap<ConnectionId, VecDeque<Envelope>>,
    delivered: u64,
}

impl LoopbackNetwork {
    pub fn new() -> Self {
        let mut inboxes = BTreeMap::new();
        inboxes.insert(HOST_CONNECTION, VecDeque::new());
        Self {
            inboxes,
            delivered: 0,
        }
    }

    pub fn connect(&mut self, connection: ConnectionId) {
        self.inboxes.entry(connection).or_default();
    }

    pub fn disconnect(&mut self, connection: ConnectionId) {
        if connection != HOST_CONNECTION {
            self.inboxes.remove(&connection);
        }
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Moves everything queued in `outbox` into the recipients' inboxes.
    pub fn route(&mut self, outbox: &mut Outbox) {
        let from = outbox.local_connection();
        let sent: Vec<_> = outbox.drain().collect();
        for (recipient, message) in sent {
            let targets: Vec<ConnectionId> = match recipient {
                Recipient::Authority => vec![HOST_CONNECTION],
                Recipient::Connection(id) => vec![id],
                Recipient::Observers => self
                    .inboxes
                    .keys()
                    .copied()
                    .filter(|&id| id != HOST_CONNECTION)
                    .collect(),
            };
            for id in targets {
                if let Some(inbox) = self.inboxes.get_mut(&id) {
                    inbox.push_back(Envelope {
                        from,
                        message: message.clone(),
                    });
                    self.delivered += 1;
                }
            }
        }
    }

    pub fn drain(&mut self, connection: ConnectionId) -> Vec<Envelope> {
        self.inboxes
            .get_mut(&connection)
            .map(|inbox| inbox.drain(..).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::SessionMessage;

    #[test]
    fn broadcast_reaches_every_client_but_not_host() {
        let mut network = LoopbackNetwork::new();
        network.connect(1);
        network.connect(2);

        let mut host = Outbox::host();
        host.broadcast_to_observers(SessionMessage::CharacterDespawned { character: 9 });
        network.route(&mut host);

        assert_eq!(network.drain(1).len(), 1);
        assert_eq!(network.drain(2).len(), 1);
        assert!(network.drain(HOST_CONNECTION).is_empty());
    }

    #[test]
    fn authority_messages_carry_sender() {
        let mut network = LoopbackNetwork::new();
        network.connect(4);

        let mut client = Outbox::new(4);
        client.send_to_authority(SessionMessage::CharacterDespawned { character: 1 });
        network.route(&mut client);

        let received = network.drain(HOST_CONNECTION);
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].from, 4);
    }

    #[test]
    fn disconnected_clients_receive_nothing() {
        let mut network = LoopbackNetwork::new();
        network.connect(1);
        network.disconnect(1);

        let mut host = Outbox::host();
        host.send_to(1, SessionMessage::CharacterDespawned { character: 1 });
        network.route(&mut host);
        assert_eq!(network.delivered(), 0);
    }
}
