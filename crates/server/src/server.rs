use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::Result;

use brickface::net::Outcome;
use brickface::{
    ChallengeOutcome, CharacterId, ConnectionId, ConnectionManager, ConnectionState, Envelope,
    HostSimulation, NetworkEndpoint, NetworkSimulator, NetworkStats, Packet, PacketHeader,
    PacketLossSimulation, PacketType, Recipient, SessionMessage,
};

use crate::config::ServerConfig;
use crate::events::{DisconnectReason, ServerEvent};
use crate::tui::CharacterInfo;

/// Dedicated host: owns the authoritative simulation and bridges its outbox onto UDP.
pub struct GameServer {
    endpoint: NetworkEndpoint,
    connections: ConnectionManager,
    config: ServerConfig,
    host: HostSimulation,
    simulator: NetworkSimulator,
    last_tick_time: Instant,
    running: Arc<AtomicBool>,
    start_time: Instant,
    pending_events: VecDeque<ServerEvent>,
}

impl GameServer {
    pub fn new(bind_addr: &str, config: ServerConfig) -> Result<Self> {
        let endpoint = NetworkEndpoint::bind(bind_addr)?;
        let host = HostSimulation::new(config.character.clone(), config.tick_rate)?;

        Ok(Self {
            endpoint,
            connections: ConnectionManager::with_timeout(config.max_clients, config.timeout_secs),
            host,
            simulator: NetworkSimulator::new(),
            last_tick_time: Instant::now(),
            running: Arc::new(AtomicBool::new(true)),
            start_time: Instant::now(),
            pending_events: VecDeque::new(),
            config,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.endpoint.local_addr()
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = ServerEvent> + '_ {
        self.pending_events.drain(..)
    }

    /// Headless loop. Events go straight to the logger.
    pub fn run(&mut self) {
        while self.running.load(Ordering::SeqCst) {
            self.tick_once();
            for event in self.pending_events.drain(..) {
                event.log();
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        self.shutdown_connections();
        for event in self.pending_events.drain(..) {
            event.log();
        }
    }

    pub fn shutdown_connections(&mut self) {
        let client_ids: Vec<ConnectionId> = self.connections.iter().map(|c| c.client_id).collect();
        for client_id in client_ids {
            self.kick_client(client_id);
        }
    }

    pub fn kick_client(&mut self, client_id: ConnectionId) {
        let Some(client) = self.connections.remove(client_id) else {
            return;
        };
        let packet = Packet::new(PacketHeader::new(0), PacketType::Disconnect);
        let _ = self.endpoint.send_to(&packet, client.addr);
        self.release_client(client_id, DisconnectReason::Kicked);
    }

    /// Reads the socket, runs every fixed tick the elapsed time covers and flushes
    /// whatever the simulation queued.
    pub fn tick_once(&mut self) {
        let now = Instant::now();
        let delta = now - self.last_tick_time;
        self.last_tick_time = now;

        if let Err(e) = self.process_network() {
            self.pending_events.push_back(ServerEvent::Error {
                message: format!("Network error: {}", e),
            });
        }

        if self.host.update(delta.as_secs_f32()) > 0 {
            self.cleanup_timed_out();
        }

        self.flush_outgoing();
        self.release_delayed();
    }

    fn cleanup_timed_out(&mut self) {
        for client in self.connections.cleanup_timed_out() {
            self.release_client(client.client_id, DisconnectReason::Timeout);
        }
    }

    /// Tears down the departed connection's character. Observers are told through
    /// the simulation outbox on the next flush.
    fn release_client(&mut self, client_id: ConnectionId, reason: DisconnectReason) {
        if let Some(character_id) = self.host.despawn_owner(client_id) {
            log::debug!("Despawned character {} of client {}", character_id, client_id);
        }
        self.pending_events
            .push_back(ServerEvent::ClientDisconnected { client_id, reason });
    }

    fn flush_outgoing(&mut self) {
        for (recipient, message) in self.host.drain_outgoing() {
            match recipient {
                Recipient::Observers => {
                    let targets: Vec<ConnectionId> =
                        self.connections.connected().map(|c| c.client_id).collect();
                    for client_id in targets {
                        self.send_session(client_id, message.clone());
                    }
                }
                Recipient::Connection(client_id) => self.send_session(client_id, message),
                Recipient::Authority => {
                    log::debug!("Dropping {} addressed to the host itself", message.kind());
                }
            }
        }
    }

    fn send_session(&mut self, client_id: ConnectionId, message: SessionMessage) {
        let Some(client) = self.connections.get_mut(client_id) else {
            return;
        };
        // Only snapshots go through the loss simulation. The next one supersedes a
        // lost one, which is not true of spawns, despawns or cues.
        let lossy = matches!(message, SessionMessage::PoseSnapshot { .. });
        let packet = Packet::session(client.next_sequence(), message);
        let addr = client.addr;
        if lossy {
            let sim = client.packet_loss_sim.clone();
            self.submit(&sim, packet, addr);
        } else {
            self.send_packet(&packet, addr);
        }
    }

    fn submit(&mut self, sim: &PacketLossSimulation, packet: Packet, addr: SocketAddr) {
        match self.simulator.submit(sim, packet, addr) {
            Outcome::SendNow(packet) => self.send_packet(&packet, addr),
            Outcome::Delayed => {}
            Outcome::Dropped => self.endpoint.stats_mut().packets_dropped += 1,
        }
    }

    fn release_delayed(&mut self) {
        for (packet, addr) in self.simulator.take_due() {
            self.send_packet(&packet, addr);
        }
    }

    fn send_packet(&mut self, packet: &Packet, addr: SocketAddr) {
        if let Err(e) = self.endpoint.send_to(packet, addr) {
            self.pending_events.push_back(ServerEvent::Error {
                message: format!("Failed to send to {}: {}", addr, e),
            });
        }
    }

    fn process_network(&mut self) -> io::Result<()> {
        let packets = self.endpoint.receive()?;

        for (packet, addr) in packets {
            self.handle_packet(packet, addr)?;
        }

        Ok(())
    }

    fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) -> io::Result<()> {
        match packet.payload {
            PacketType::ConnectionRequest { client_salt, name } => {
                self.handle_connection_request(addr, client_salt, name)?;
            }
            PacketType::ChallengeResponse { combined_salt } => {
                self.handle_challenge_response(addr, combined_salt)?;
            }
            PacketType::Session(message) => {
                self.handle_session_message(addr, message);
            }
            PacketType::Ping { timestamp } => {
                self.handle_ping(addr, timestamp)?;
            }
            PacketType::Disconnect => {
                self.handle_disconnect(addr);
            }
            _ => {}
        }

        if let Some(client) = self.connections.get_by_addr_mut(&addr) {
            client.touch();
        }

        Ok(())
    }

    fn handle_connection_request(
        &mut self,
        addr: SocketAddr,
        client_salt: u64,
        name: String,
    ) -> io::Result<()> {
        self.pending_events.push_back(ServerEvent::ClientConnecting {
            addr,
            name: name.clone(),
        });

        let client = match self.connections.get_or_create_pending(addr, client_salt) {
            Ok(c) => c,
            Err(reason) => return self.deny(addr, reason.to_string()),
        };
        client.name = name;

        let header = PacketHeader::new(client.next_sequence());
        let packet = Packet::new(
            header,
            PacketType::ConnectionChallenge {
                server_salt: client.server_salt,
                challenge: client.combined_salt(),
            },
        );

        self.endpoint.send_to(&packet, addr)?;

        Ok(())
    }

    fn handle_challenge_response(
        &mut self,
        addr: SocketAddr,
        combined_salt: u64,
    ) -> io::Result<()> {
        let client_id = match self.connections.verify_challenge(&addr, combined_salt) {
            ChallengeOutcome::Unknown => return Ok(()),
            ChallengeOutcome::Mismatch => {
                self.pending_events.push_back(ServerEvent::Error {
                    message: format!("Invalid challenge response from {}", addr),
                });
                return Ok(());
            }
            ChallengeOutcome::Repeated(client_id, character_id) => {
                return self.send_accepted(client_id, character_id);
            }
            ChallengeOutcome::Accepted(client_id) => client_id,
        };

        let Some(client) = self.connections.get_mut(client_id) else {
            return Ok(());
        };
        if let Some(sim) = &self.config.global_packet_loss {
            client.packet_loss_sim = sim.clone();
        }
        let name = client.name.clone();

        match self.host.spawn(client_id, &name) {
            Ok(character_id) => {
                if let Some(client) = self.connections.get_mut(client_id) {
                    client.character_id = Some(character_id);
                }
                self.pending_events.push_back(ServerEvent::ClientConnected {
                    client_id,
                    addr,
                    character_id,
                });
                self.send_accepted(client_id, character_id)
            }
            Err(e) => {
                self.connections.remove(client_id);
                self.deny(addr, e.to_string())
            }
        }
    }

    fn send_accepted(
        &mut self,
        client_id: ConnectionId,
        character_id: CharacterId,
    ) -> io::Result<()> {
        let Some(client) = self.connections.get_mut(client_id) else {
            return Ok(());
        };
        let packet = Packet::new(
            PacketHeader::new(client.next_sequence()),
            PacketType::ConnectionAccepted {
                client_id,
                character_id,
            },
        );
        let addr = client.addr;
        self.endpoint.send_to(&packet, addr)?;
        Ok(())
    }

    fn deny(&mut self, addr: SocketAddr, reason: String) -> io::Result<()> {
        let packet = Packet::new(
            PacketHeader::new(0),
            PacketType::ConnectionDenied {
                reason: reason.clone(),
            },
        );
        self.endpoint.send_to(&packet, addr)?;
        self.pending_events
            .push_back(ServerEvent::ConnectionDenied { addr, reason });
        Ok(())
    }

    fn handle_session_message(&mut self, addr: SocketAddr, message: SessionMessage) {
        let Some(client) = self.connections.get_by_addr(&addr) else {
            return;
        };

        if client.state != ConnectionState::Connected {
            return;
        }

        let client_id = client.client_id;
        if let Err(e) = self.host.handle_message(Envelope {
            from: client_id,
            message,
        }) {
            self.pending_events.push_back(ServerEvent::MessageRejected {
                client_id,
                reason: e.to_string(),
            });
        }
    }

    fn handle_ping(&mut self, addr: SocketAddr, timestamp: u64) -> io::Result<()> {
        let packet = Packet::new(PacketHeader::new(0), PacketType::Pong { timestamp });
        self.endpoint.send_to(&packet, addr)?;
        Ok(())
    }

    fn handle_disconnect(&mut self, addr: SocketAddr) {
        if let Some(client) = self.connections.remove_by_addr(&addr) {
            self.release_client(client.client_id, DisconnectReason::Graceful);
        }
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            tick: self.host.tick(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            client_count: self.connections.connected_count(),
            max_clients: self.config.max_clients,
            character_count: self.host.character_count(),
            rejected: self.host.rejected(),
            delayed_packets: self.simulator.pending(),
            network_stats: self.endpoint.stats().clone(),
        }
    }

    pub fn character_infos(&self) -> Vec<CharacterInfo> {
        self.host
            .characters()
            .map(|c| CharacterInfo {
                id: c.id(),
                owner: c.owner(),
                name: c.name().to_string(),
                balance_mode: c.balance_mode(),
                on_floor: c.is_on_floor(),
                moving: c.animator().is_moving(),
                snapshots_sent: c.snapshots_sent(),
                position: c.torso_position(),
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ServerStats {
    pub tick: u64,
    pub uptime_secs: u64,
    pub client_count: usize,
    pub max_clients: usize,
    pub character_count: usize,
    pub rejected: u64,
    pub delayed_packets: usize,
    pub network_stats: NetworkStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lossy_server() -> GameServer {
        let config = ServerConfig {
            global_packet_loss: Some(PacketLossSimulation {
                enabled: true,
                loss_percent: 100.0,
                ..Default::default()
            }),
            ..Default::default()
        };
        GameServer::new("127.0.0.1:0", config).unwrap()
    }

    /// Ticks the server for `ms` and collects whatever reaches the client.
    fn pump(server: &mut GameServer, client: &mut NetworkEndpoint, ms: u64) -> Vec<PacketType> {
        let mut received = Vec::new();
        let start = Instant::now();
        while start.elapsed() < Duration::from_millis(ms) {
            server.tick_once();
            for (packet, _) in client.receive().unwrap() {
                received.push(packet.payload);
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        received
    }

    #[test]
    fn packet_loss_only_drops_snapshots() {
        let mut server = lossy_server();
        let mut client = NetworkEndpoint::bind("127.0.0.1:0").unwrap();
        client.set_remote(server.local_addr());

        let request = client.create_packet(PacketType::ConnectionRequest {
            client_salt: 42,
            name: "Ada".to_string(),
        });
        client.send(&request).unwrap();
        let challenge = pump(&mut server, &mut client, 100)
            .into_iter()
            .find_map(|payload| match payload {
                PacketType::ConnectionChallenge { challenge, .. } => Some(challenge),
                _ => None,
            })
            .unwrap();

        let response = client.create_packet(PacketType::ChallengeResponse {
            combined_salt: challenge,
        });
        client.send(&response).unwrap();
        let received = pump(&mut server, &mut client, 400);

        assert!(
            received
                .iter()
                .any(|p| matches!(p, PacketType::ConnectionAccepted { .. }))
        );
        assert!(received.iter().any(|p| matches!(
            p,
            PacketType::Session(SessionMessage::CharacterSpawned { name, .. }) if name == "Ada"
        )));
        assert!(!received.iter().any(|p| matches!(
            p,
            PacketType::Session(SessionMessage::PoseSnapshot { .. })
        )));
        assert!(server.stats().network_stats.packets_dropped > 0);
    }
}
