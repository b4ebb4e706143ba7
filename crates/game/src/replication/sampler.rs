use crate::skeleton::Skeleton;

use super::ring::PoseSnapshot;

/// Emits a snapshot every `1 / update_rate` seconds of simulated time.
#[derive(Debug, Clone)]
pub struct SnapshotSampler {
    interval: f64,
    elapsed: f64,
    time: f64,
    sent: u64,
}

impl SnapshotSampler {
    pub fn new(update_rate: f32) -> Self {
        Self {
            interval: 1.0 / update_rate.max(f32::EPSILON) as f64,
            elapsed: 0.0,
            time: 0.0,
            sent: 0,
        }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn advance(&mut self, skeleton: &Skeleton, dt: f32) -> Option<PoseSnapshot> {
        let dt = dt.max(0.0) as f64;
        self.time += dt;
        self.elapsed += dt;
        if self.elapsed < self.interval {
            return None;
        }
        // At most one snapshot per tick; leftover time carries over.
        self.elapsed = (self.elapsed - self.interval).min(self.interval);
        self.sent += 1;
        Some(PoseSnapshot::sample(skeleton, self.time))
    }
}
