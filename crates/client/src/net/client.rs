use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use brickface::net::rand_u64;
use brickface::{
    ArmSide, CharacterId, ConnectionId, ConnectionState, FirstPersonView, NetworkEndpoint,
    NetworkStats, ObserverSimulation, PacketType, Recipient, SessionMessage, ViewConfig,
};

use super::config::ClientConfig;
use crate::script::InputScript;

/// UDP client that renders every character from snapshots and forwards scripted
/// owner input to the host.
pub struct NetworkClient {
    endpoint: NetworkEndpoint,
    config: ClientConfig,
    name: String,
    state: ConnectionState,
    character_id: Option<CharacterId>,
    client_salt: u64,
    observer: ObserverSimulation,
    view: FirstPersonView,
    last_input_time: Instant,
    input_interval: Duration,
    last_ping_time: Instant,
    ping_interval: Duration,
    last_request_time: Instant,
    request_interval: Duration,
    connection_start_time: Option<Instant>,
    clock: Instant,
    running: Arc<AtomicBool>,
}

impl NetworkClient {
    pub fn new(config: ClientConfig, name: &str) -> anyhow::Result<Self> {
        let mut endpoint = NetworkEndpoint::bind("0.0.0.0:0")?;
        endpoint.set_timeout(Duration::from_secs(config.connection_timeout_secs));

        // The real connection id arrives with the accept.
        let observer = ObserverSimulation::new(config.character.clone(), config.tick_rate, 0)?;

        Ok(Self {
            endpoint,
            name: name.to_string(),
            state: ConnectionState::Disconnected,
            character_id: None,
            client_salt: rand_u64(),
            observer,
            view: FirstPersonView::new(ViewConfig::default()),
            last_input_time: Instant::now(),
            input_interval: Duration::from_secs_f64(1.0 / config.input_rate.max(1) as f64),
            last_ping_time: Instant::now(),
            ping_interval: Duration::from_secs_f32(config.ping_interval_secs),
            last_request_time: Instant::now(),
            request_interval: Duration::from_secs_f32(config.request_interval_secs),
            connection_start_time: None,
            clock: Instant::now(),
            running: Arc::new(AtomicBool::new(true)),
            config,
        })
    }

    pub fn connect(&mut self, server_addr: SocketAddr) -> io::Result<()> {
        log::info!("Connecting to {} as {}", server_addr, self.name);

        self.endpoint.set_remote(server_addr);
        self.state = ConnectionState::Connecting;
        self.connection_start_time = Some(Instant::now());

        self.send_connection_request()
    }

    pub fn disconnect(&mut self) -> io::Result<()> {
        if self.state == ConnectionState::Connected {
            let packet = self.endpoint.create_packet(PacketType::Disconnect);
            let _ = self.endpoint.send(&packet);
        }
        self.state = ConnectionState::Disconnected;
        Ok(())
    }

    fn send_connection_request(&mut self) -> io::Result<()> {
        let packet = self.endpoint.create_packet(PacketType::ConnectionRequest {
            client_salt: self.client_salt,
            name: self.name.clone(),
        });
        self.endpoint.send(&packet)?;
        self.last_request_time = Instant::now();
        Ok(())
    }

    /// One frame: read the socket, feed input at the configured rate, run the
    /// observer's fixed ticks and flush what it queued for the host.
    pub fn update(&mut self, delta_time: f32, script: &mut InputScript) -> io::Result<()> {
        self.process_network()?;

        match self.state {
            ConnectionState::Connecting | ConnectionState::ChallengeResponse => {
                let timeout = Duration::from_secs(self.config.connection_timeout_secs);
                if self
                    .connection_start_time
                    .is_some_and(|start| start.elapsed() > timeout)
                {
                    log::warn!("Connection timeout");
                    self.state = ConnectionState::Disconnected;
                } else if self.state == ConnectionState::Connecting
                    && self.last_request_time.elapsed() >= self.request_interval
                {
                    self.send_connection_request()?;
                }
            }
            ConnectionState::Connected => {
                let since_input = self.last_input_time.elapsed();
                if since_input >= self.input_interval {
                    self.last_input_time = Instant::now();
                    self.drive_input(script, since_input.as_secs_f32());
                }

                self.observer.update(delta_time);
                self.flush_outgoing()?;

                if self.last_ping_time.elapsed() >= self.ping_interval {
                    self.send_ping()?;
                    self.last_ping_time = Instant::now();
                }

                if self.endpoint.is_timed_out() {
                    log::warn!("Server connection lost");
                    self.state = ConnectionState::Disconnected;
                }
            }
            _ => {}
        }

        Ok(())
    }

    fn drive_input(&mut self, script: &mut InputScript, dt: f32) {
        let frame = script.advance(dt);
        self.view.update(frame.look_delta, frame.turn, dt);
        self.observer.capture_move(frame.movement);
        if let Some(weight) = frame.arms {
            self.observer.capture_arm(ArmSide::Left, weight);
            self.observer.capture_arm(ArmSide::Right, weight);
        }
        self.observer.send_input(self.view.aim_direction());
    }

    fn flush_outgoing(&mut self) -> io::Result<()> {
        for (recipient, message) in self.observer.drain_outgoing() {
            if recipient != Recipient::Authority {
                log::debug!("Dropping {} addressed to {:?}", message.kind(), recipient);
                continue;
            }
            self.endpoint.send_session(message)?;
        }
        Ok(())
    }

    fn send_ping(&mut self) -> io::Result<()> {
        let timestamp = self.now_ms();
        let packet = self.endpoint.create_packet(PacketType::Ping { timestamp });
        self.endpoint.send(&packet)?;
        Ok(())
    }

    fn now_ms(&self) -> u64 {
        self.clock.elapsed().as_millis() as u64
    }

    fn process_network(&mut self) -> io::Result<()> {
        let packets = self.endpoint.receive()?;

        for (packet, _addr) in packets {
            self.handle_payload(packet.payload)?;
        }

        Ok(())
    }

    fn handle_payload(&mut self, payload: PacketType) -> io::Result<()> {
        match payload {
            PacketType::ConnectionChallenge {
                server_salt,
                challenge,
            } => {
                self.handle_challenge(server_salt, challenge)?;
            }
            PacketType::ConnectionAccepted {
                client_id,
                character_id,
            } => {
                self.handle_connection_accepted(client_id, character_id);
            }
            PacketType::ConnectionDenied { reason } => {
                log::warn!("Connection denied: {}", reason);
                self.state = ConnectionState::Disconnected;
            }
            PacketType::Session(message) => {
                self.handle_session_message(message);
            }
            PacketType::Pong { timestamp } => {
                let rtt = self.now_ms().saturating_sub(timestamp);
                self.endpoint.stats_mut().record_rtt(rtt as f32);
                log::debug!("Ping RTT: {} ms", rtt);
            }
            PacketType::Disconnect => {
                log::info!("Disconnected by server");
                self.state = ConnectionState::Disconnected;
            }
            _ => {}
        }

        Ok(())
    }

    fn handle_challenge(&mut self, server_salt: u64, challenge: u64) -> io::Result<()> {
        log::debug!("Received challenge from server");

        let expected_challenge = self.client_salt ^ server_salt;
        if challenge != expected_challenge {
            log::warn!("Challenge mismatch");
            return Ok(());
        }

        self.state = ConnectionState::ChallengeResponse;
        let packet = self.endpoint.create_packet(PacketType::ChallengeResponse {
            combined_salt: expected_challenge,
        });
        self.endpoint.send(&packet)?;

        Ok(())
    }

    fn handle_connection_accepted(&mut self, client_id: ConnectionId, character_id: CharacterId) {
        if self.state == ConnectionState::Connected {
            return;
        }
        log::info!(
            "Connected to server with client ID {}, character {}",
            client_id,
            character_id
        );

        self.character_id = Some(character_id);
        self.state = ConnectionState::Connected;
        self.observer.set_local_connection(client_id);
    }

    fn handle_session_message(&mut self, message: SessionMessage) {
        if self.state != ConnectionState::Connected {
            log::debug!("Ignoring {} before the accept", message.kind());
            return;
        }
        if let SessionMessage::CharacterSpawned {
            character, name, ..
        } = &message
        {
            log::info!("Character {} ({}) joined", character, name);
        }
        if let SessionMessage::CharacterDespawned { character } = &message {
            log::info!("Character {} left", character);
        }
        self.observer.handle_message(message);
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn character_id(&self) -> Option<CharacterId> {
        self.character_id
    }

    pub fn stats(&self) -> &NetworkStats {
        self.endpoint.stats()
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.disconnect();
    }

    /// One line summary for periodic logging.
    pub fn status_line(&self) -> String {
        let owned = match self.character_id.and_then(|id| self.observer.character(id)) {
            Some(character) => {
                let torso = character.torso_position();
                format!(
                    "torso ({:.2}, {:.2}, {:.2}) {} clip {} snaps {}",
                    torso.x,
                    torso.y,
                    torso.z,
                    if character.is_on_floor() { "grounded" } else { "airborne" },
                    character.animator().clip(),
                    character.snapshots_received()
                )
            }
            None => "no character".to_string(),
        };
        format!(
            "tick {} | characters {} | {} | yaw {:.0} pitch {:.0} | rtt {:.1}ms",
            self.observer.tick(),
            self.observer.character_count(),
            owned,
            self.view.body_yaw() + self.view.yaw(),
            self.view.pitch(),
            self.stats().rtt_ms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> NetworkClient {
        NetworkClient::new(ClientConfig::default(), "Ada").unwrap()
    }

    #[test]
    fn test_client_creation() {
        let client = client();
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert_eq!(client.character_id(), None);
        assert!(client.status_line().contains("no character"));
    }

    #[test]
    fn session_messages_wait_for_accept() {
        let mut client = client();
        client.handle_session_message(SessionMessage::CharacterDespawned { character: 1 });
        assert_eq!(client.observer.ignored(), 0);

        client.handle_connection_accepted(4, 9);
        assert!(client.is_connected());
        assert_eq!(client.observer.local_connection(), 4);
        client.handle_session_message(SessionMessage::CharacterSpawned {
            character: 9,
            owner: 4,
            name: "Ada".into(),
            position: [0.0; 3],
        });
        assert_eq!(client.observer.owned_id(), Some(9));
    }

    #[test]
    fn scripted_input_goes_to_the_authority() {
        let mut client = client();
        client.handle_connection_accepted(4, 9);
        client.handle_session_message(SessionMessage::CharacterSpawned {
            character: 9,
            owner: 4,
            name: "Ada".into(),
            position: [0.0; 3],
        });

        let mut script: InputScript = "reach:1".parse().unwrap();
        client.drive_input(&mut script, 1.0 / 60.0);
        let sent = client.observer.drain_outgoing();
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|(to, _)| *to == Recipient::Authority));
        assert!(matches!(sent[2].1, SessionMessage::MoveInput { character: 9, .. }));
    }
}
