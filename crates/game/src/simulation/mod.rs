mod host;
mod observer;
mod tick;

pub use host::HostSimulation;
pub use observer::ObserverSimulation;
pub use tick::FixedTimestep;

use glam::Vec3;

use crate::physics::{PhysicsConfig, PhysicsWorld};

/// Empty arena with the ground slab every simulation stands on.
pub(crate) fn arena(config: &PhysicsConfig, dt: f32) -> PhysicsWorld {
    let mut world = PhysicsWorld::new(config, dt);
    world.add_ground(0.0, config.ground_half_size);
    world
}

/// Spawn points on a line along X, one per character slot.
pub fn spawn_position(slot: u32) -> Vec3 {
    const SPACING: f32 = 2.0;
    let offset = (slot / 2 + slot % 2) as f32 * SPACING;
    let side = if slot % 2 == 0 { -1.0 } else { 1.0 };
    Vec3::new(offset * side, 0.0, 0.0)
}
