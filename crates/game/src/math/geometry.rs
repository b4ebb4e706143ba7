use glam::{Quat, Vec3};

const EPSILON: f32 = 1e-6;

pub fn forward(rotation: Quat) -> Vec3 {
    rotation * Vec3::Z
}

pub fn up(rotation: Quat) -> Vec3 {
    rotation * Vec3::Y
}

/// Right-hand side of a body facing `forward(rotation)` with `up(rotation)` overhead.
pub fn right(rotation: Quat) -> Vec3 {
    forward(rotation).cross(up(rotation))
}

/// Rotation whose forward axis is `direction` and whose up axis is as close to `up_hint`
/// as possible. Returns identity for a zero direction.
pub fn look_rotation(direction: Vec3, up_hint: Vec3) -> Quat {
    let Some(z) = direction.try_normalize() else {
        return Quat::IDENTITY;
    };

    let x = match up_hint.cross(z).try_normalize() {
        Some(x) => x,
        None => {
            let fallback = if z.y.abs() < 0.99 { Vec3::Y } else { Vec3::X };
            fallback.cross(z).normalize()
        }
    };
    let y = z.cross(x);

    Quat::from_mat3(&glam::Mat3::from_cols(x, y, z)).normalize()
}

/// Projection of `v` onto the horizontal plane, normalized. Zero when `v` is vertical.
pub fn floor_projection(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z).normalize_or_zero()
}

pub fn angle_between_deg(a: Vec3, b: Vec3) -> f32 {
    if a.length_squared() < EPSILON || b.length_squared() < EPSILON {
        return 0.0;
    }
    a.angle_between(b).to_degrees()
}

/// Angle from `from` to `to` around `axis`, in degrees, in `[-180, 180]`.
pub fn signed_angle_deg(from: Vec3, to: Vec3, axis: Vec3) -> f32 {
    let unsigned = angle_between_deg(from, to);
    let sign = axis.dot(from.cross(to));
    if sign < 0.0 { -unsigned } else { unsigned }
}

pub fn reflect(v: Vec3, normal: Vec3) -> Vec3 {
    let n = normal.normalize_or_zero();
    v - 2.0 * v.dot(n) * n
}
