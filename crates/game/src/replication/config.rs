use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ensure_positive};

/// Which ring slot observers move towards.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum SlotPolicy {
    /// Smooth towards whichever slot was written last.
    #[default]
    Latest,
    /// Play back `delay` seconds behind the newest authority timestamp, blending the
    /// two slots that bracket that time. Late snapshots are dropped.
    Buffered { delay: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationConfig {
    /// Snapshots per second of simulated time.
    pub update_rate: f32,
    /// Smoothing speed as a fraction of `update_rate`.
    pub smoothing_factor: f32,
    pub slot_policy: SlotPolicy,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            update_rate: 15.0,
            smoothing_factor: 0.5,
            slot_policy: SlotPolicy::Latest,
        }
    }
}

impl ReplicationConfig {
    pub fn smoothing_speed(&self) -> f32 {
        self.update_rate * self.smoothing_factor
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("replication.update_rate", self.update_rate)?;
        ensure_positive("replication.smoothing_factor", self.smoothing_factor)?;
        if let SlotPolicy::Buffered { delay } = self.slot_policy {
            ensure_positive("replication.slot_policy.delay", delay as f32)?;
        }
        Ok(())
    }
}
