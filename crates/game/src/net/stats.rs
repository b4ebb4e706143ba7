use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};

#[derive(Debug, Clone, Default)]
pub struct PacketLossSimulation {
    pub enabled: bool,
    pub loss_percent: f32,
    pub min_latency_ms: u32,
    pub max_latency_ms: u32,
    pub jitter_ms: u32,
}

impl PacketLossSimulation {
    pub fn should_drop(&self) -> bool {
        if !self.enabled || self.loss_percent <= 0.0 {
            return false;
        }
        rand_percent() * 100.0 < self.loss_percent
    }

    pub fn delay_ms(&self) -> u32 {
        if !self.enabled || self.max_latency_ms == 0 {
            return 0;
        }
        let base = self.min_latency_ms;
        let range = self.max_latency_ms.saturating_sub(self.min_latency_ms);
        let jitter = if self.jitter_ms > 0 {
            (rand_percent() * self.jitter_ms as f32) as u32
        } else {
            0
        };
        base + (rand_percent() * range as f32) as u32 + jitter
    }
}

#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub packets_dropped: u64,
    /// Datagrams that were not valid packets of this protocol.
    pub packets_rejected: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub rtt_ms: f32,
    pub rtt_variance: f32,
}

impl NetworkStats {
    /// Smoothed round trip estimate fed from ping/pong pairs.
    pub fn record_rtt(&mut self, sample_ms: f32) {
        if self.rtt_ms == 0.0 {
            self.rtt_ms = sample_ms;
            self.rtt_variance = sample_ms / 2.0;
            return;
        }
        let error = (sample_ms - self.rtt_ms).abs();
        self.rtt_variance = self.rtt_variance * 0.75 + error * 0.25;
        self.rtt_ms = self.rtt_ms * 0.875 + sample_ms * 0.125;
    }
}

/// Uniform value in [0, 1).
pub fn rand_percent() -> f32 {
    (rand_u64() >> 40) as f32 / (1u64 << 24) as f32
}

pub fn rand_u64() -> u64 {
    let mut hasher = RandomState::new().build_hasher();
    hasher.write_u128(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default(),
    );
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_simulation_never_drops() {
        let sim = PacketLossSimulation {
            enabled: false,
            loss_percent: 100.0,
            ..Default::default()
        };
        assert!(!sim.should_drop());
        assert_eq!(sim.delay_ms(), 0);
    }

    #[test]
    fn full_loss_always_drops() {
        let sim = PacketLossSimulation {
            enabled: true,
            loss_percent: 100.0,
            ..Default::default()
        };
        assert!((0..50).all(|_| sim.should_drop()));
    }

    #[test]
    fn delay_stays_in_range() {
        let sim = PacketLossSimulation {
            enabled: true,
            min_latency_ms: 20,
            max_latency_ms: 60,
            jitter_ms: 5,
            ..Default::default()
        };
        for _ in 0..50 {
            let delay = sim.delay_ms();
            assert!((20..=65).contains(&delay), "delay {delay}");
        }
    }

    #[test]
    fn rtt_smoothing_converges() {
        let mut stats = NetworkStats::default();
        stats.record_rtt(100.0);
        for _ in 0..100 {
            stats.record_rtt(40.0);
        }
        assert!((stats.rtt_ms - 40.0).abs() < 0.5);
    }
}
