mod config;
mod interpolator;
mod ring;
mod sampler;

pub use config::{ReplicationConfig, SlotPolicy};
pub use interpolator::PoseInterpolator;
pub use ring::{PoseSnapshot, SNAPSHOT_SLOTS, SnapshotRing, TimedSnapshot};
pub use sampler::SnapshotSampler;
