use glam::{Quat, Vec3};

use crate::skeleton::Skeleton;

pub const SNAPSHOT_SLOTS: usize = 3;

/// One sampled pose of every synced bone, stamped with authority simulation time.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseSnapshot {
    pub positions: Vec<Vec3>,
    pub rotations: Vec<Quat>,
    pub timestamp: f64,
}

impl PoseSnapshot {
    pub fn sample(skeleton: &Skeleton, timestamp: f64) -> Self {
        Self {
            positions: skeleton.sample_positions(),
            rotations: skeleton.sample_rotations(),
            timestamp,
        }
    }

    pub fn bone_count(&self) -> usize {
        self.positions.len().min(self.rotations.len())
    }

    pub fn is_finite(&self) -> bool {
        self.timestamp.is_finite()
            && self.positions.iter().all(|p| p.is_finite())
            && self.rotations.iter().all(|r| r.is_finite())
    }
}

#[derive(Debug, Clone)]
pub struct TimedSnapshot {
    pub snapshot: PoseSnapshot,
    pub received_at: f64,
}

/// Fixed ring of snapshot slots. Writes advance the index cyclically and the
/// most recently written slot is the current one.
#[derive(Debug, Clone, Default)]
pub struct SnapshotRing {
    slots: [Option<TimedSnapshot>; SNAPSHOT_SLOTS],
    index: usize,
    received: u64,
}

impl SnapshotRing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, snapshot: PoseSnapshot, received_at: f64) {
        if self.received > 0 {
            self.index = (self.index + 1) % SNAPSHOT_SLOTS;
        }
        self.slots[self.index] = Some(TimedSnapshot {
            snapshot,
            received_at,
        });
        self.received += 1;
    }

    pub fn current(&self) -> Option<&TimedSnapshot> {
        self.slots[self.index].as_ref()
    }

    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn newest_timestamp(&self) -> Option<f64> {
        self.iter()
            .map(|s| s.snapshot.timestamp)
            .max_by(|a, b| a.total_cmp(b))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimedSnapshot> {
        self.slots.iter().flatten()
    }

    /// Filled slots ordered by authority timestamp, oldest first.
    pub fn by_timestamp(&self) -> Vec<&TimedSnapshot> {
        let mut ordered: Vec<&TimedSnapshot> = self.iter().collect();
        ordered.sort_by(|a, b| a.snapshot.timestamp.total_cmp(&b.snapshot.timestamp));
        ordered
    }
}
