use std::collections::VecDeque;

use glam::{Vec2, Vec3};

use crate::animation::ArmSide;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputState {
    pub movement: Vec2,
    pub aim_direction: Vec3,
    pub left_arm: f32,
    pub right_arm: f32,
}

impl Default for InputState {
    fn default() -> Self {
        Self {
            movement: Vec2::ZERO,
            aim_direction: Vec3::Z,
            left_arm: 0.0,
            right_arm: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Move { movement: Vec2, aim_direction: Vec3 },
    Arm { side: ArmSide, weight: f32 },
}

/// Owner-side input surface. Disabled everywhere except on the owning connection.
/// Captured events are delivered in capture order, with the per-frame move last.
#[derive(Debug, Clone)]
pub struct InputRouter {
    enabled: bool,
    state: InputState,
    pending: VecDeque<InputEvent>,
}

impl InputRouter {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            state: InputState::default(),
            pending: VecDeque::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn state(&self) -> &InputState {
        &self.state
    }

    pub fn capture_move(&mut self, movement: Vec2) {
        if !self.enabled {
            return;
        }
        self.state.movement = if movement.is_finite() {
            movement.clamp_length_max(1.0)
        } else {
            Vec2::ZERO
        };
    }

    pub fn capture_arm(&mut self, side: ArmSide, weight: f32) {
        if !self.enabled {
            return;
        }
        let weight = if weight.is_finite() {
            weight.clamp(0.0, 1.0)
        } else {
            0.0
        };
        match side {
            ArmSide::Left => self.state.left_arm = weight,
            ArmSide::Right => self.state.right_arm = weight,
        }
        self.pending.push_back(InputEvent::Arm { side, weight });
    }

    /// Closes an input frame. The move event is emitted every frame, even when zero,
    /// so the body keeps tracking the view.
    pub fn frame(&mut self, aim_direction: Vec3) -> Vec<InputEvent> {
        if !self.enabled {
            return Vec::new();
        }
        if let Some(aim) = aim_direction.try_normalize() {
            self.state.aim_direction = aim;
        }
        self.pending.push_back(InputEvent::Move {
            movement: self.state.movement,
            aim_direction: self.state.aim_direction,
        });
        self.pending.drain(..).collect()
    }
}
