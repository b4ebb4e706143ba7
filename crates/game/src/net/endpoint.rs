use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

use super::protocol::{MAX_PACKET_SIZE, Packet, PacketHeader, PacketType, SessionMessage};
use super::stats::NetworkStats;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Anything shorter cannot hold an archived header.
const MIN_PACKET_SIZE: usize = 8;

/// Non-blocking UDP socket carrying rkyv packets. A client points it at one
/// server with `set_remote`; the host answers each peer with `send_to`.
pub struct NetworkEndpoint {
    socket: UdpSocket,
    local_addr: SocketAddr,
    remote_addr: Option<SocketAddr>,
    send_sequence: u32,
    stats: NetworkStats,
    recv_buffer: [u8; MAX_PACKET_SIZE],
    timeout: Duration,
    last_receive_time: Instant,
}

impl NetworkEndpoint {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        let local_addr = socket.local_addr()?;

        Ok(Self {
            socket,
            local_addr,
            remote_addr: None,
            send_sequence: 0,
            stats: NetworkStats::default(),
            recv_buffer: [0u8; MAX_PACKET_SIZE],
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            last_receive_time: Instant::now(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn set_remote(&mut self, addr: SocketAddr) {
        self.remote_addr = Some(addr);
        self.last_receive_time = Instant::now();
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut NetworkStats {
        &mut self.stats
    }

    /// Wraps `payload` with this endpoint's next sequence number.
    pub fn create_packet(&mut self, payload: PacketType) -> Packet {
        let sequence = self.send_sequence;
        self.send_sequence = self.send_sequence.wrapping_add(1);
        Packet::new(PacketHeader::new(sequence), payload)
    }

    /// Sends one session message to the remote peer.
    pub fn send_session(&mut self, message: SessionMessage) -> io::Result<usize> {
        let packet = self.create_packet(PacketType::Session(message));
        self.send(&packet)
    }

    pub fn send_to(&mut self, packet: &Packet, addr: SocketAddr) -> io::Result<usize> {
        let data = packet.serialize()?;
        if data.len() > MAX_PACKET_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} byte packet exceeds MTU", data.len()),
            ));
        }

        let bytes = self.socket.send_to(&data, addr)?;
        self.stats.packets_sent += 1;
        self.stats.bytes_sent += bytes as u64;
        Ok(bytes)
    }

    pub fn send(&mut self, packet: &Packet) -> io::Result<usize> {
        let addr = self
            .remote_addr
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "No remote address set"))?;
        self.send_to(packet, addr)
    }

    /// Drains the socket. Malformed datagrams and foreign protocols are counted
    /// and skipped.
    pub fn receive(&mut self) -> io::Result<Vec<(Packet, SocketAddr)>> {
        let mut packets = Vec::new();

        loop {
            let (size, addr) = match self.socket.recv_from(&mut self.recv_buffer) {
                Ok(received) => received,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            };

            let packet = if size < MIN_PACKET_SIZE {
                None
            } else {
                Packet::deserialize(&self.recv_buffer[..size])
                    .ok()
                    .filter(|p| p.header.is_valid())
            };
            let Some(packet) = packet else {
                log::debug!("Dropping {} byte datagram from {}", size, addr);
                self.stats.packets_rejected += 1;
                continue;
            };

            self.stats.packets_received += 1;
            self.stats.bytes_received += size as u64;
            self.last_receive_time = Instant::now();
            packets.push((packet, addr));
        }

        Ok(packets)
    }

    /// Time since the last valid packet arrived.
    pub fn silence(&self) -> Duration {
        self.last_receive_time.elapsed()
    }

    pub fn is_timed_out(&self) -> bool {
        self.silence() > self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (NetworkEndpoint, NetworkEndpoint) {
        let server = NetworkEndpoint::bind("127.0.0.1:0").expect("bind server");
        let mut client = NetworkEndpoint::bind("127.0.0.1:0").expect("bind client");
        client.set_remote(server.local_addr());
        (server, client)
    }

    fn receive_some(endpoint: &mut NetworkEndpoint) -> Vec<(Packet, SocketAddr)> {
        for _ in 0..200 {
            let packets = endpoint.receive().expect("receive");
            if !packets.is_empty() {
                return packets;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        Vec::new()
    }

    #[test]
    fn session_messages_carry_increasing_sequences() {
        let (mut server, mut client) = pair();
        let floor = SessionMessage::FloorChanged {
            character: 3,
            on_floor: false,
        };
        client.send_session(floor.clone()).expect("send");
        client.send_session(floor.clone()).expect("send");

        let mut received = receive_some(&mut server);
        if received.len() < 2 {
            received.extend(receive_some(&mut server));
        }
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].1, client.local_addr());
        assert!(matches!(&received[0].0.payload, PacketType::Session(m) if *m == floor));
        let sequences: Vec<u32> = received.iter().map(|(p, _)| p.header.sequence).collect();
        assert_eq!(sequences, vec![0, 1]);
        assert_eq!(client.stats().packets_sent, 2);
        assert_eq!(server.stats().packets_received, 2);
    }

    #[test]
    fn garbage_datagrams_are_counted_not_returned() {
        let (mut server, _client) = pair();
        let raw = UdpSocket::bind("127.0.0.1:0").expect("bind raw");
        raw.send_to(&[0xAB; 32], server.local_addr()).expect("send raw");
        raw.send_to(&[1, 2, 3], server.local_addr()).expect("send raw");

        for _ in 0..200 {
            assert!(server.receive().expect("receive").is_empty());
            if server.stats().packets_rejected == 2 {
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(server.stats().packets_rejected, 2);
        assert_eq!(server.stats().packets_received, 0);
    }

    #[test]
    fn send_without_remote_is_an_error() {
        let mut endpoint = NetworkEndpoint::bind("127.0.0.1:0").expect("bind");
        let packet = endpoint.create_packet(PacketType::Disconnect);
        let err = endpoint.send(&packet).expect_err("no remote");
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[test]
    fn silence_drives_the_timeout() {
        let mut endpoint = NetworkEndpoint::bind("127.0.0.1:0").expect("bind");
        endpoint.set_timeout(Duration::ZERO);
        std::thread::sleep(Duration::from_millis(2));
        assert!(endpoint.is_timed_out());
        endpoint.set_timeout(Duration::from_secs(60));
        assert!(!endpoint.is_timed_out());
    }
}
