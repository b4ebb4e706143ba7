use glam::{Quat, Vec3};

use crate::math::look_rotation;
use crate::skeleton::{BoneId, BoneTransform, Skeleton};

const MIN_REACH: f32 = 1e-4;

fn rotate_segment(skeleton: &mut Skeleton, bone: BoneId, child: BoneId, towards: Vec3) {
    let origin = skeleton.world(bone).position;
    let current = skeleton.world(child).position - origin;
    let desired = towards - origin;
    let (Some(from), Some(to)) = (current.try_normalize(), desired.try_normalize()) else {
        return;
    };
    skeleton.rotate_world(bone, Quat::from_rotation_arc(from, to));
}

/// Analytic two-bone IK on `chain = [upper, lower, end]`. The end effector is moved to
/// `target`, bending towards `hint`, and the result is blended into the pose by `weight`.
pub fn solve_two_bone(
    skeleton: &mut Skeleton,
    chain: [BoneId; 3],
    target: BoneTransform,
    hint: Vec3,
    weight: f32,
) {
    let weight = weight.clamp(0.0, 1.0);
    if weight <= 0.0 || !target.is_finite() || !hint.is_finite() {
        return;
    }

    let [upper, lower, end] = chain;
    let original = chain.map(|bone| skeleton.local(bone).rotation);

    let shoulder = skeleton.world(upper).position;
    let elbow = skeleton.world(lower).position;
    let wrist = skeleton.world(end).position;
    let a = shoulder.distance(elbow);
    let b = elbow.distance(wrist);
    if a < MIN_REACH || b < MIN_REACH {
        return;
    }

    let to_target = target.position - shoulder;
    let Some(dir) = to_target.try_normalize() else {
        return;
    };
    let d = to_target.length().clamp((a - b).abs() + MIN_REACH, a + b - MIN_REACH);

    let cos_shoulder = ((a * a + d * d - b * b) / (2.0 * a * d)).clamp(-1.0, 1.0);
    let sin_shoulder = (1.0 - cos_shoulder * cos_shoulder).max(0.0).sqrt();

    let pole = {
        let from_hint = hint - shoulder;
        let from_elbow = elbow - shoulder;
        (from_hint - dir * from_hint.dot(dir))
            .try_normalize()
            .or_else(|| (from_elbow - dir * from_elbow.dot(dir)).try_normalize())
            .unwrap_or_else(|| dir.any_orthonormal_vector())
    };

    let solved_elbow = shoulder + dir * (a * cos_shoulder) + pole * (a * sin_shoulder);
    let solved_wrist = shoulder + dir * d;

    rotate_segment(skeleton, upper, lower, solved_elbow);
    rotate_segment(skeleton, lower, end, solved_wrist);

    let end_rotation = skeleton.world(end).rotation;
    skeleton.rotate_world(end, target.rotation * end_rotation.inverse());

    if weight < 1.0 {
        for (bone, from) in chain.into_iter().zip(original) {
            let solved = skeleton.local(bone).rotation;
            skeleton.set_local_rotation(bone, from.slerp(solved, weight));
        }
        skeleton.solve_world();
    }
}

/// Turns the neck and head towards `point`, split by `neck_share`, blended by `weight`.
pub fn solve_look(skeleton: &mut Skeleton, point: Vec3, neck_share: f32, weight: f32) {
    let weight = weight.clamp(0.0, 1.0);
    if weight <= 0.0 || !point.is_finite() {
        return;
    }

    let head = skeleton.world(BoneId::Head);
    let up_hint = skeleton.anchor().rotation * Vec3::Y;
    let Some(direction) = (point - head.position).try_normalize() else {
        return;
    };

    let desired = look_rotation(direction, up_hint);
    let full = (desired * head.rotation.inverse()).normalize();
    let neck_share = neck_share.clamp(0.0, 1.0);

    let neck_delta = Quat::IDENTITY.slerp(full, weight * neck_share);
    skeleton.rotate_world(BoneId::Neck, neck_delta);

    let head_rotation = skeleton.world(BoneId::Head).rotation;
    let target = head.rotation.slerp(desired, weight);
    skeleton.rotate_world(BoneId::Head, (target * head_rotation.inverse()).normalize());
}
