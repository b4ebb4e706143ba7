use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::session::{CharacterId, ConnectionId};

use super::stats::{PacketLossSimulation, rand_u64};

const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    ChallengeResponse,
    Connected,
}

/// Result of checking a challenge response against a pending connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeOutcome {
    /// No handshake in progress for that address.
    Unknown,
    Mismatch,
    /// First valid response. The connection is now `Connected`.
    Accepted(ConnectionId),
    /// A repeat of a response that already produced a character, so the accept was lost.
    Repeated(ConnectionId, CharacterId),
}

#[derive(Debug)]
pub struct ClientConnection {
    pub addr: SocketAddr,
    pub client_id: ConnectionId,
    pub name: String,
    pub state: ConnectionState,
    pub client_salt: u64,
    pub server_salt: u64,
    pub last_receive_time: Instant,
    pub character_id: Option<CharacterId>,
    pub send_sequence: u32,
    pub packet_loss_sim: PacketLossSimulation,
}

impl ClientConnection {
    pub fn new(addr: SocketAddr, client_id: ConnectionId, client_salt: u64) -> Self {
        Self {
            addr,
            client_id,
            name: String::new(),
            state: ConnectionState::Connecting,
            client_salt,
            server_salt: rand_u64(),
            last_receive_time: Instant::now(),
            character_id: None,
            send_sequence: 0,
            packet_loss_sim: PacketLossSimulation::default(),
        }
    }

    pub fn combined_salt(&self) -> u64 {
        self.client_salt ^ self.server_salt
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_receive_time.elapsed() > timeout
    }

    pub fn touch(&mut self) {
        self.last_receive_time = Instant::now();
    }

    pub fn next_sequence(&mut self) -> u32 {
        let sequence = self.send_sequence;
        self.send_sequence = self.send_sequence.wrapping_add(1);
        sequence
    }
}

#[derive(Debug)]
pub struct ConnectionManager {
    clients_by_addr: HashMap<SocketAddr, ConnectionId>,
    clients: HashMap<ConnectionId, ClientConnection>,
    next_client_id: ConnectionId,
    max_clients: usize,
    timeout: Duration,
}

impl ConnectionManager {
    pub fn new(max_clients: usize) -> Self {
        Self::with_timeout(max_clients, DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(max_clients: usize, timeout_secs: u64) -> Self {
        Self {
            clients_by_addr: HashMap::new(),
            clients: HashMap::new(),
            // 0 is the host connection.
            next_client_id: 1,
            max_clients,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn get_or_create_pending(
        &mut self,
        addr: SocketAddr,
        client_salt: u64,
    ) -> Result<&mut ClientConnection, &'static str> {
        let client_id = match self.clients_by_addr.get(&addr) {
            Some(&id) => id,
            None => {
                if self.clients.len() >= self.max_clients {
                    return Err("Server full");
                }
                let id = self.next_client_id;
                self.next_client_id += 1;
                self.clients
                    .insert(id, ClientConnection::new(addr, id, client_salt));
                self.clients_by_addr.insert(addr, id);
                id
            }
        };

        self.clients
            .get_mut(&client_id)
            .ok_or("Connection table out of sync")
    }

    /// Validates `combined_salt` for the handshake at `addr`, promoting it to
    /// `Connected` on the first match.
    pub fn verify_challenge(&mut self, addr: &SocketAddr, combined_salt: u64) -> ChallengeOutcome {
        let Some(client) = self.get_by_addr_mut(addr) else {
            return ChallengeOutcome::Unknown;
        };
        if combined_salt != client.combined_salt() {
            return ChallengeOutcome::Mismatch;
        }
        if let Some(character_id) = client.character_id {
            return ChallengeOutcome::Repeated(client.client_id, character_id);
        }
        client.state = ConnectionState::Connected;
        ChallengeOutcome::Accepted(client.client_id)
    }

    pub fn get_by_addr(&self, addr: &SocketAddr) -> Option<&ClientConnection> {
        self.clients_by_addr
            .get(addr)
            .and_then(|id| self.clients.get(id))
    }

    pub fn get_by_addr_mut(&mut self, addr: &SocketAddr) -> Option<&mut ClientConnection> {
        let id = self.clients_by_addr.get(addr)?;
        self.clients.get_mut(id)
    }

    pub fn get(&self, client_id: ConnectionId) -> Option<&ClientConnection> {
        self.clients.get(&client_id)
    }

    pub fn get_mut(&mut self, client_id: ConnectionId) -> Option<&mut ClientConnection> {
        self.clients.get_mut(&client_id)
    }

    pub fn remove(&mut self, client_id: ConnectionId) -> Option<ClientConnection> {
        let conn = self.clients.remove(&client_id)?;
        self.clients_by_addr.remove(&conn.addr);
        Some(conn)
    }

    pub fn remove_by_addr(&mut self, addr: &SocketAddr) -> Option<ClientConnection> {
        let client_id = self.clients_by_addr.remove(addr)?;
        self.clients.remove(&client_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientConnection> {
        self.clients.values()
    }

    pub fn connected(&self) -> impl Iterator<Item = &ClientConnection> {
        self.clients
            .values()
            .filter(|c| c.state == ConnectionState::Connected)
    }

    /// Removes and returns every connection that has been silent past the timeout.
    pub fn cleanup_timed_out(&mut self) -> Vec<ClientConnection> {
        let timed_out: Vec<ConnectionId> = self
            .clients
            .iter()
            .filter(|(_, c)| c.is_timed_out(self.timeout))
            .map(|(&id, _)| id)
            .collect();

        timed_out
            .into_iter()
            .filter_map(|id| self.remove(id))
            .collect()
    }

    pub fn connected_count(&self) -> usize {
        self.connected().count()
    }

    pub fn total_count(&self) -> usize {
        self.clients.len()
    }

    pub fn max_clients(&self) -> usize {
        self.max_clients
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn same_address_reuses_connection() {
        let mut manager = ConnectionManager::new(4);
        let first = manager.get_or_create_pending(addr(5000), 1).unwrap().client_id;
        let second = manager.get_or_create_pending(addr(5000), 2).unwrap().client_id;
        assert_eq!(first, second);
        assert_eq!(manager.total_count(), 1);
    }

    #[test]
    fn client_ids_never_collide_with_host() {
        let mut manager = ConnectionManager::new(4);
        let id = manager.get_or_create_pending(addr(5001), 1).unwrap().client_id;
        assert_ne!(id, crate::session::HOST_CONNECTION);
    }

    #[test]
    fn full_server_denies() {
        let mut manager = ConnectionManager::new(1);
        manager.get_or_create_pending(addr(5002), 1).unwrap();
        assert_eq!(
            manager.get_or_create_pending(addr(5003), 1).err(),
            Some("Server full")
        );
    }

    #[test]
    fn challenge_is_verified_once() {
        let mut manager = ConnectionManager::new(4);
        let client = manager.get_or_create_pending(addr(5005), 7).unwrap();
        let (id, salt) = (client.client_id, client.combined_salt());

        assert_eq!(
            manager.verify_challenge(&addr(5006), salt),
            ChallengeOutcome::Unknown
        );
        assert_eq!(
            manager.verify_challenge(&addr(5005), salt ^ 1),
            ChallengeOutcome::Mismatch
        );
        assert_eq!(manager.connected_count(), 0);

        assert_eq!(
            manager.verify_challenge(&addr(5005), salt),
            ChallengeOutcome::Accepted(id)
        );
        assert_eq!(manager.connected_count(), 1);

        manager.get_mut(id).unwrap().character_id = Some(3);
        assert_eq!(
            manager.verify_challenge(&addr(5005), salt),
            ChallengeOutcome::Repeated(id, 3)
        );
    }

    #[test]
    fn silent_connections_time_out() {
        let mut manager = ConnectionManager::with_timeout(4, 0);
        manager.get_or_create_pending(addr(5004), 1).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        let removed = manager.cleanup_timed_out();
        assert_eq!(removed.len(), 1);
        assert_eq!(manager.total_count(), 0);
    }
}
