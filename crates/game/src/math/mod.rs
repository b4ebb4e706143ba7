mod curve;
mod geometry;

pub use curve::ResponseCurve;
pub use geometry::{
    angle_between_deg, floor_projection, forward, look_rotation, reflect, right, signed_angle_deg,
    up,
};
