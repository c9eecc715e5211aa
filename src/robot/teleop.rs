//! Keyboard tele-operation.
//!
//! The operator holds keys; every tick the set of held keys is turned into one
//! body velocity and one relative head movement.

use super::session::Locomotion;
use crate::constants::TELEOP_BODY_SPEED;
use crate::movement_policy::MovementVector;
use crate::Result;
use std::collections::BTreeSet;

/// Head pitch step while the up arrow is held
const HEAD_UP_PITCH: f64 = 0.07;
/// Head pitch step while the down arrow is held; wins over up
const HEAD_DOWN_PITCH: f64 = -0.06;
const HEAD_YAW_STEP: f64 = 0.05;

/// Keys with a tele-operation binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Forward,
    Backward,
    StrafeLeft,
    StrafeRight,
    TurnLeft,
    TurnRight,
    HeadUp,
    HeadDown,
    HeadLeft,
    HeadRight,
}

impl Key {
    /// Map a key name (`w`, `s`, `a`, `d`, `q`, `e`, `up`, `down`, `left`, `right`)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "w" => Some(Self::Forward),
            "s" => Some(Self::Backward),
            "a" => Some(Self::StrafeLeft),
            "d" => Some(Self::StrafeRight),
            "q" => Some(Self::TurnLeft),
            "e" => Some(Self::TurnRight),
            "up" => Some(Self::HeadUp),
            "down" => Some(Self::HeadDown),
            "left" => Some(Self::HeadLeft),
            "right" => Some(Self::HeadRight),
            _ => None,
        }
    }
}

/// Keys currently held down
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyState {
    pressed: BTreeSet<Key>,
}

impl KeyState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, key: Key) {
        self.pressed.insert(key);
    }

    pub fn release(&mut self, key: Key) {
        self.pressed.remove(&key);
    }

    pub fn clear(&mut self) {
        self.pressed.clear();
    }

    pub fn is_pressed(&self, key: Key) -> bool {
        self.pressed.contains(&key)
    }

    /// Combine the held keys into a command
    pub fn command(&self) -> TeleopCommand {
        let axis = |positive: Key, negative: Key| {
            let mut value = 0.0;
            if self.is_pressed(positive) {
                value += TELEOP_BODY_SPEED;
            }
            if self.is_pressed(negative) {
                value -= TELEOP_BODY_SPEED;
            }
            value
        };

        let mut pitch = 0.0;
        if self.is_pressed(Key::HeadUp) {
            pitch = HEAD_UP_PITCH;
        }
        if self.is_pressed(Key::HeadDown) {
            pitch = HEAD_DOWN_PITCH;
        }
        let mut yaw = 0.0;
        if self.is_pressed(Key::HeadLeft) {
            yaw += HEAD_YAW_STEP;
        }
        if self.is_pressed(Key::HeadRight) {
            yaw -= HEAD_YAW_STEP;
        }

        TeleopCommand {
            x: axis(Key::Forward, Key::Backward),
            y: axis(Key::StrafeLeft, Key::StrafeRight),
            theta: axis(Key::TurnLeft, Key::TurnRight),
            head: MovementVector::new(yaw, pitch),
        }
    }
}

/// Body velocity plus relative head movement for one tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TeleopCommand {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
    pub head: MovementVector,
}

impl TeleopCommand {
    pub fn has_body_motion(&self) -> bool {
        self.x != 0.0 || self.y != 0.0 || self.theta != 0.0
    }

    pub fn has_head_motion(&self) -> bool {
        self.head != MovementVector::ZERO
    }

    /// Walk while any body key is held, stop otherwise
    ///
    /// # Errors
    ///
    /// Propagates locomotion failures
    pub fn drive(&self, locomotion: &dyn Locomotion) -> Result<()> {
        if self.has_body_motion() {
            locomotion.move_toward(self.x, self.y, self.theta)
        } else {
            locomotion.stop_move()
        }
    }
}
