use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use super::protocol::Packet;
use super::stats::PacketLossSimulation;

#[derive(Debug)]
struct DelayedPacket {
    release_time: Instant,
    packet: Packet,
    addr: SocketAddr,
}

impl PartialEq for DelayedPacket {
    fn eq(&self, other: &Self) -> bool {
        self.release_time == other.release_time
    }
}

impl Eq for DelayedPacket {}

impl PartialOrd for DelayedPacket {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedPacket {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        other.release_time.cmp(&self.release_time)
    }
}

#[derive(Debug)]
pub enum Outcome {
    SendNow(Packet),
    Delayed,
    Dropped,
}

/// Applies per-connection loss and latency to outbound packets.
#[derive(Debug, Default)]
pub struct NetworkSimulator {
    outbound: BinaryHeap<DelayedPacket>,
    dropped: u64,
}

impl NetworkSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(
        &mut self,
        sim: &PacketLossSimulation,
        packet: Packet,
        addr: SocketAddr,
    ) -> Outcome {
        if sim.should_drop() {
            self.dropped += 1;
            return Outcome::Dropped;
        }
        let delay = Duration::from_millis(sim.delay_ms() as u64);
        if delay.is_zero() {
            return Outcome::SendNow(packet);
        }
        self.outbound.push(DelayedPacket {
            release_time: Instant::now() + delay,
            packet,
            addr,
        });
        Outcome::Delayed
    }

    pub fn take_due(&mut self) -> Vec<(Packet, SocketAddr)> {
        let now = Instant::now();
        let mut due = Vec::new();
        while self
            .outbound
            .peek()
            .is_some_and(|delayed| delayed.release_time <= now)
        {
            if let Some(delayed) = self.outbound.pop() {
                due.push((delayed.packet, delayed.addr));
            }
        }
        due
    }

    pub fn pending(&self) -> usize {
        self.outbound.len()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
