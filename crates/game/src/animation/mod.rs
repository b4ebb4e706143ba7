mod animator;
mod config;
mod ik;
mod joint_targets;
mod solver;

pub use animator::{Animator, IDLE_CLIP, IN_THE_AIR_CLIP};
pub use config::IkConfig;
pub use ik::{ArmChain, ArmSide, IkBlender, IkRig, IkTargets};
pub use joint_targets::JointTargets;
pub use solver::{solve_look, solve_two_bone};
