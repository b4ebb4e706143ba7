mod bone;
mod pose;

pub use bone::{BONE_COUNT, BoneFlags, BoneId};
pub use pose::{Bone, BoneTransform, Skeleton};
