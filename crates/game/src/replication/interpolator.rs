use glam::{Quat, Vec3};

use crate::skeleton::{BoneTransform, Skeleton};

use super::config::{ReplicationConfig, SlotPolicy};
use super::ring::{PoseSnapshot, SnapshotRing};

/// Observer-side smoothing of incoming snapshots into a local skeleton.
#[derive(Debug, Clone)]
pub struct PoseInterpolator {
    ring: SnapshotRing,
    policy: SlotPolicy,
    smoothing_speed: f32,
    clock: f64,
    dropped: u64,
}

impl PoseInterpolator {
    pub fn new(config: &ReplicationConfig) -> Self {
        Self {
            ring: SnapshotRing::new(),
            policy: config.slot_policy,
            smoothing_speed: config.smoothing_speed(),
            clock: 0.0,
            dropped: 0,
        }
    }

    pub fn ring(&self) -> &SnapshotRing {
        &self.ring
    }

    pub fn policy(&self) -> SlotPolicy {
        self.policy
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn receive(&mut self, snapshot: PoseSnapshot) -> bool {
        if !snapshot.is_finite() {
            log::debug!("Discarding non-finite snapshot at {}", snapshot.timestamp);
            self.dropped += 1;
            return false;
        }
        if matches!(self.policy, SlotPolicy::Buffered { .. })
            && self
                .ring
                .newest_timestamp()
                .is_some_and(|newest| snapshot.timestamp <= newest)
        {
            self.dropped += 1;
            return false;
        }
        self.ring.push(snapshot, self.clock);
        true
    }

    /// The pose the skeleton is moving towards this tick, if any snapshot arrived yet.
    pub fn target(&self) -> Option<PoseSnapshot> {
        match self.policy {
            SlotPolicy::Latest => self.ring.current().map(|s| s.snapshot.clone()),
            SlotPolicy::Buffered { delay } => self.buffered_target(delay),
        }
    }

    fn buffered_target(&self, delay: f64) -> Option<PoseSnapshot> {
        let ordered = self.ring.by_timestamp();
        let newest = ordered.last()?;
        let playback = newest.snapshot.timestamp + (self.clock - newest.received_at) - delay;

        let first = ordered.first()?;
        if playback <= first.snapshot.timestamp {
            return Some(first.snapshot.clone());
        }
        for pair in ordered.windows(2) {
            let (from, to) = (&pair[0].snapshot, &pair[1].snapshot);
            if playback <= to.timestamp {
                let span = to.timestamp - from.timestamp;
                let t = if span > 0.0 {
                    ((playback - from.timestamp) / span) as f32
                } else {
                    1.0
                };
                return Some(blend(from, to, t));
            }
        }
        Some(newest.snapshot.clone())
    }

    /// Advances the local clock and moves every synced bone towards the target pose.
    pub fn apply(&mut self, skeleton: &mut Skeleton, dt: f32) -> bool {
        self.clock += dt.max(0.0) as f64;
        let Some(target) = self.target() else {
            return false;
        };

        let t = match self.policy {
            SlotPolicy::Latest => (dt * self.smoothing_speed).clamp(0.0, 1.0),
            SlotPolicy::Buffered { .. } => 1.0,
        };

        let ids: Vec<_> = skeleton.synced_bones().map(|b| b.id).collect();
        if ids.len() != target.bone_count() {
            log::debug!(
                "Snapshot bone count {} does not match skeleton ({})",
                target.bone_count(),
                ids.len()
            );
        }
        for (i, id) in ids.into_iter().enumerate().take(target.bone_count()) {
            let current = skeleton.world(id);
            let position = current.position.lerp(target.positions[i], t);
            let rotation = current.rotation.slerp(target.rotations[i], t).normalize();
            skeleton.set_world(id, BoneTransform::new(position, rotation));
        }
        true
    }
}

fn blend(from: &PoseSnapshot, to: &PoseSnapshot, t: f32) -> PoseSnapshot {
    let t = t.clamp(0.0, 1.0);
    let positions: Vec<Vec3> = from
        .positions
        .iter()
        .zip(&to.positions)
        .map(|(a, b)| a.lerp(*b, t))
        .collect();
    let rotations: Vec<Quat> = from
        .rotations
        .iter()
        .zip(&to.rotations)
        .map(|(a, b)| a.slerp(*b, t).normalize())
        .collect();
    PoseSnapshot {
        positions,
        rotations,
        timestamp: from.timestamp + (to.timestamp - from.timestamp) * t as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::BoneId;

    fn offset_snapshot(skeleton: &Skeleton, offset: Vec3, timestamp: f64) -> PoseSnapshot {
        let mut snapshot = PoseSnapshot::sample(skeleton, timestamp);
        for p in &mut snapshot.positions {
            *p += offset;
        }
        snapshot
    }

    #[test]
    fn latest_policy_targets_most_recent_snapshot() {
        let skeleton = Skeleton::default();
        let mut interp = PoseInterpolator::new(&ReplicationConfig::default());
        for i in 0..5 {
            let snapshot = offset_snapshot(&skeleton, Vec3::X * i as f32, i as f64);
            assert!(interp.receive(snapshot));
        }
        assert_eq!(interp.ring().capacity(), 3);
        let target = interp.target().expect("target");
        assert_eq!(target.timestamp, 4.0);
        assert!((target.positions[0].x - 4.0).abs() < 1e-6);
    }

    #[test]
    fn latest_policy_still_follows_out_of_order_arrivals() {
        let skeleton = Skeleton::default();
        let mut interp = PoseInterpolator::new(&ReplicationConfig::default());
        interp.receive(offset_snapshot(&skeleton, Vec3::X, 2.0));
        interp.receive(offset_snapshot(&skeleton, Vec3::ZERO, 1.0));
        assert_eq!(interp.target().map(|t| t.timestamp), Some(1.0));
    }

    #[test]
    fn smoothing_moves_part_way() {
        let mut skeleton = Skeleton::default();
        let start = skeleton.world(BoneId::Torso).position;
        let mut interp = PoseInterpolator::new(&ReplicationConfig::default());
        interp.receive(offset_snapshot(&skeleton, Vec3::X, 0.1));

        assert!(interp.apply(&mut skeleton, 0.02));
        let moved = skeleton.world(BoneId::Torso).position - start;
        assert!((moved.x - 0.15).abs() < 1e-4, "moved {moved}");

        for _ in 0..200 {
            interp.apply(&mut skeleton, 0.02);
        }
        let settled = skeleton.world(BoneId::Torso).position - start;
        assert!((settled.x - 1.0).abs() < 1e-3);
    }

    #[test]
    fn nothing_to_apply_before_first_snapshot() {
        let mut skeleton = Skeleton::default();
        let mut interp = PoseInterpolator::new(&ReplicationConfig::default());
        assert!(!interp.apply(&mut skeleton, 0.02));
    }

    #[test]
    fn buffered_policy_drops_late_snapshots() {
        let skeleton = Skeleton::default();
        let config = ReplicationConfig {
            slot_policy: SlotPolicy::Buffered { delay: 0.1 },
            ..Default::default()
        };
        let mut interp = PoseInterpolator::new(&config);
        assert!(interp.receive(offset_snapshot(&skeleton, Vec3::ZERO, 1.0)));
        assert!(!interp.receive(offset_snapshot(&skeleton, Vec3::ZERO, 0.9)));
        assert_eq!(interp.dropped(), 1);
        assert_eq!(interp.ring().filled(), 1);
    }

    #[test]
    fn buffered_policy_blends_bracketing_slots() {
        let skeleton = Skeleton::default();
        let config = ReplicationConfig {
            slot_policy: SlotPolicy::Buffered { delay: 0.1 },
            ..Default::default()
        };
        let mut interp = PoseInterpolator::new(&config);
        interp.receive(offset_snapshot(&skeleton, Vec3::ZERO, 1.0));
        interp.receive(offset_snapshot(&skeleton, Vec3::X * 2.0, 1.2));

        let target = interp.target().expect("target");
        assert!((target.timestamp - 1.1).abs() < 1e-6);
        let base = skeleton.world(BoneId::Torso).position;
        assert!((target.positions[0].x - (base.x + 1.0)).abs() < 1e-4);
    }
}
