mod part;

pub use part::{BodyPart, BodyPartRegistry};

pub const HEAD_NECK: &str = "Head Neck";
pub const TORSO: &str = "Torso";
pub const LEFT_ARM: &str = "Left Arm";
pub const RIGHT_ARM: &str = "Right Arm";
pub const LEFT_LEG: &str = "Left Leg";
pub const RIGHT_LEG: &str = "Right Leg";
