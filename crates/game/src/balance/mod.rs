mod config;
mod controller;
mod mode;

pub use config::BalanceConfig;
pub use controller::{BalanceController, TorsoCommand, TorsoState, apply_angular_drag};
pub use mode::BalanceMode;
