use crate::skeleton::BoneId;

use super::{HEAD_NECK, LEFT_ARM, LEFT_LEG, RIGHT_ARM, RIGHT_LEG, TORSO};

/// Named group of physics joints sharing one drive strength scale.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyPart {
    name: String,
    joints: Vec<BoneId>,
    strength: f32,
}

impl BodyPart {
    pub fn new(name: impl Into<String>, joints: Vec<BoneId>) -> Self {
        Self {
            name: name.into(),
            joints,
            strength: 1.0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn joints(&self) -> &[BoneId] {
        &self.joints
    }

    pub fn strength(&self) -> f32 {
        self.strength
    }

    pub fn set_strength(&mut self, strength: f32) {
        self.strength = if strength.is_finite() {
            strength.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    pub fn contains(&self, bone: BoneId) -> bool {
        self.joints.contains(&bone)
    }
}

#[derive(Debug, Clone)]
pub struct BodyPartRegistry {
    parts: Vec<BodyPart>,
}

impl Default for BodyPartRegistry {
    fn default() -> Self {
        Self::humanoid()
    }
}

impl BodyPartRegistry {
    pub fn new(parts: Vec<BodyPart>) -> Self {
        for part in &parts {
            if part.joints.is_empty() {
                log::warn!("Body part '{}' has no joints", part.name);
            }
        }
        Self { parts }
    }

    pub fn humanoid() -> Self {
        use BoneId::*;
        Self::new(vec![
            BodyPart::new(HEAD_NECK, vec![Head, Neck]),
            BodyPart::new(TORSO, vec![Chest]),
            BodyPart::new(LEFT_ARM, vec![LeftArm, LeftForearm, LeftHand]),
            BodyPart::new(RIGHT_ARM, vec![RightArm, RightForearm, RightHand]),
            BodyPart::new(LEFT_LEG, vec![LeftThigh, LeftCalve, LeftFoot]),
            BodyPart::new(RIGHT_LEG, vec![RightThigh, RightCalve, RightFoot]),
        ])
    }

    pub fn parts(&self) -> &[BodyPart] {
        &self.parts
    }

    pub fn get(&self, name: &str) -> Option<&BodyPart> {
        self.parts.iter().find(|p| p.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut BodyPart> {
        self.parts.iter_mut().find(|p| p.name == name)
    }

    /// Sets the strength of a named part. Unknown names are logged and ignored.
    pub fn set_strength(&mut self, name: &str, strength: f32) -> bool {
        match self.get_mut(name) {
            Some(part) => {
                part.set_strength(strength);
                true
            }
            None => {
                log::warn!("Unknown body part '{}'", name);
                false
            }
        }
    }

    pub fn set_strength_all(&mut self, strength: f32) {
        for part in &mut self.parts {
            part.set_strength(strength);
        }
    }

    /// Strength applied to the joint of `bone`. Joints outside every part run at full strength.
    pub fn joint_strength(&self, bone: BoneId) -> f32 {
        self.parts
            .iter()
            .find(|p| p.contains(bone))
            .map(|p| p.strength)
            .unwrap_or(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn humanoid_groups_every_jointed_bone() {
        let registry = BodyPartRegistry::humanoid();
        assert_eq!(registry.parts().len(), 6);
        for bone in BoneId::ALL.iter().skip(1) {
            assert!(
                registry.parts().iter().any(|p| p.contains(*bone)),
                "{bone} not grouped"
            );
        }
    }

    #[test]
    fn strength_is_clamped() {
        let mut registry = BodyPartRegistry::humanoid();
        registry.set_strength(LEFT_LEG, 4.0);
        assert_eq!(registry.get(LEFT_LEG).map(|p| p.strength()), Some(1.0));
        registry.set_strength(LEFT_LEG, -1.0);
        assert_eq!(registry.get(LEFT_LEG).map(|p| p.strength()), Some(0.0));
        registry.set_strength(LEFT_LEG, f32::NAN);
        assert_eq!(registry.get(LEFT_LEG).map(|p| p.strength()), Some(0.0));
    }

    #[test]
    fn unknown_part_is_ignored() {
        let mut registry = BodyPartRegistry::humanoid();
        assert!(!registry.set_strength("Tail", 0.5));
        assert!(registry.parts().iter().all(|p| p.strength() == 1.0));
    }

    #[test]
    fn joint_strength_follows_part() {
        let mut registry = BodyPartRegistry::humanoid();
        registry.set_strength(HEAD_NECK, 0.1);
        assert!((registry.joint_strength(BoneId::Neck) - 0.1).abs() < 1e-6);
        assert_eq!(registry.joint_strength(BoneId::Torso), 1.0);
        registry.set_strength_all(0.3);
        assert!((registry.joint_strength(BoneId::RightFoot) - 0.3).abs() < 1e-6);
    }
}
