use std::str::FromStr;

use anyhow::{Context, bail};
use glam::Vec2;

/// Look speed in view units per second, before the view's sensitivity.
const LOOK_RATE: f32 = 15.0;
const DEFAULT_STEP_SECS: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Idle,
    Forward,
    Back,
    StrafeLeft,
    StrafeRight,
    TurnLeft,
    TurnRight,
    LookUp,
    LookDown,
    Reach,
    Lower,
}

impl Action {
    fn parse(name: &str) -> Option<Self> {
        let action = match name {
            "idle" => Action::Idle,
            "forward" => Action::Forward,
            "back" => Action::Back,
            "left" => Action::StrafeLeft,
            "right" => Action::StrafeRight,
            "turn-left" => Action::TurnLeft,
            "turn-right" => Action::TurnRight,
            "look-up" => Action::LookUp,
            "look-down" => Action::LookDown,
            "reach" => Action::Reach,
            "lower" => Action::Lower,
            _ => return None,
        };
        Some(action)
    }

    fn movement(self) -> Vec2 {
        match self {
            Action::Forward => Vec2::Y,
            Action::Back => Vec2::NEG_Y,
            Action::StrafeLeft => Vec2::NEG_X,
            Action::StrafeRight => Vec2::X,
            _ => Vec2::ZERO,
        }
    }

    fn arm_weight(self) -> Option<f32> {
        match self {
            Action::Reach => Some(1.0),
            Action::Lower => Some(0.0),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Step {
    action: Action,
    duration: f32,
}

/// Input for one frame of the script.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScriptFrame {
    pub movement: Vec2,
    pub look_delta: Vec2,
    pub turn: f32,
    /// Set on the first frame of a reach or lower step, for both arms.
    pub arms: Option<f32>,
}

/// Looping sequence of timed actions standing in for a player at the keyboard.
///
/// Written as comma separated `action[:seconds]`, for example
/// `forward:3,turn-right:1.5,reach,idle:2`.
#[derive(Debug, Clone)]
pub struct InputScript {
    steps: Vec<Step>,
    index: usize,
    elapsed: f32,
    entered: bool,
}

impl InputScript {
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn advance(&mut self, dt: f32) -> ScriptFrame {
        let Some(step) = self.steps.get(self.index).copied() else {
            return ScriptFrame {
                movement: Vec2::ZERO,
                look_delta: Vec2::ZERO,
                turn: 0.0,
                arms: None,
            };
        };

        let arms = if self.entered {
            None
        } else {
            self.entered = true;
            step.action.arm_weight()
        };

        let look = LOOK_RATE * dt;
        let frame = ScriptFrame {
            movement: step.action.movement(),
            look_delta: match step.action {
                Action::LookUp => Vec2::new(0.0, look),
                Action::LookDown => Vec2::new(0.0, -look),
                _ => Vec2::ZERO,
            },
            turn: match step.action {
                Action::TurnLeft => -1.0,
                Action::TurnRight => 1.0,
                _ => 0.0,
            },
            arms,
        };

        self.elapsed += dt;
        if self.elapsed >= step.duration {
            self.elapsed = 0.0;
            self.index = (self.index + 1) % self.steps.len();
            self.entered = false;
        }

        frame
    }
}

impl FromStr for InputScript {
    type Err = anyhow::Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut steps = Vec::new();
        for token in text.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (name, secs) = match token.split_once(':') {
                Some((name, secs)) => {
                    let secs: f32 = secs
                        .parse()
                        .with_context(|| format!("bad duration in `{}`", token))?;
                    (name, secs)
                }
                None => (token, DEFAULT_STEP_SECS),
            };
            let Some(action) = Action::parse(name) else {
                bail!("unknown action `{}`", name);
            };
            if !(secs > 0.0 && secs.is_finite()) {
                bail!("duration of `{}` must be positive", token);
            }
            steps.push(Step {
                action,
                duration: secs,
            });
        }
        if steps.is_empty() {
            bail!("input script has no steps");
        }
        Ok(Self {
            steps,
            index: 0,
            elapsed: 0.0,
            entered: false,
        })
    }
}
