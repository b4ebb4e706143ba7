use serde::{Deserialize, Serialize};

/// Control law applied to the physical torso each fixed tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BalanceMode {
    UprightTorque,
    ManualTorque,
    #[default]
    StabilizerJoint,
    FreezeRotations,
    None,
}

impl BalanceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BalanceMode::UprightTorque => "upright-torque",
            BalanceMode::ManualTorque => "manual-torque",
            BalanceMode::StabilizerJoint => "stabilizer-joint",
            BalanceMode::FreezeRotations => "freeze-rotations",
            BalanceMode::None => "none",
        }
    }
}

impl std::fmt::Display for BalanceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
