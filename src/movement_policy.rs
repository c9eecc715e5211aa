//! Rule-based corrective movements keyed by face position.

use crate::constants::{STEP_PITCH_DOWN, STEP_PITCH_UP, STEP_YAW};
use crate::position::PositionLabel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Add;

/// Head movement in radians as `(delta_yaw, delta_pitch)`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MovementVector {
    pub yaw: f64,
    pub pitch: f64,
}

impl MovementVector {
    pub const ZERO: Self = Self { yaw: 0.0, pitch: 0.0 };

    pub const fn new(yaw: f64, pitch: f64) -> Self {
        Self { yaw, pitch }
    }

    pub const fn to_array(self) -> [f64; 2] {
        [self.yaw, self.pitch]
    }

    pub fn is_finite(&self) -> bool {
        self.yaw.is_finite() && self.pitch.is_finite()
    }
}

impl Add for MovementVector {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.yaw + rhs.yaw, self.pitch + rhs.pitch)
    }
}

/// Position → movement lookup table.
///
/// The table travels with model snapshots, so a reloaded table may differ from
/// [`MovementTable::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementTable {
    entries: BTreeMap<PositionLabel, MovementVector>,
}

impl Default for MovementTable {
    fn default() -> Self {
        let entries = [
            (PositionLabel::Right, MovementVector::new(-STEP_YAW, 0.0)),
            (PositionLabel::Left, MovementVector::new(STEP_YAW, 0.0)),
            (PositionLabel::Top, MovementVector::new(0.0, -STEP_PITCH_UP)),
            (PositionLabel::Bottom, MovementVector::new(0.0, STEP_PITCH_DOWN)),
            (PositionLabel::TopRight, MovementVector::new(-STEP_YAW, -STEP_PITCH_UP)),
            (PositionLabel::TopLeft, MovementVector::new(STEP_YAW, -STEP_PITCH_UP)),
            (PositionLabel::BottomRight, MovementVector::new(-STEP_YAW, STEP_PITCH_DOWN)),
            (PositionLabel::BottomLeft, MovementVector::new(STEP_YAW, STEP_PITCH_DOWN)),
            (PositionLabel::Centered, MovementVector::ZERO),
            (PositionLabel::NotDetected, MovementVector::ZERO),
        ]
        .into_iter()
        .collect();
        Self { entries }
    }
}

impl MovementTable {
    /// Empty table; every corrective label falls back to the zero vector
    pub fn empty() -> Self {
        Self { entries: BTreeMap::new() }
    }

    /// Movement for a label.
    ///
    /// Degenerate labels yield `None` (no command). A label absent from the
    /// table yields `Some(MovementVector::ZERO)`.
    pub fn movement_for(&self, label: PositionLabel) -> Option<MovementVector> {
        if label.is_degenerate() {
            return None;
        }
        Some(self.entries.get(&label).copied().unwrap_or(MovementVector::ZERO))
    }

    /// Movement for a label given by name; unrecognised names yield the zero vector
    pub fn movement_for_name(&self, name: &str) -> Option<MovementVector> {
        match name.parse::<PositionLabel>() {
            Ok(label) => self.movement_for(label),
            Err(_) => {
                log::debug!("Unknown position label '{}', defaulting to no-op vector", name);
                Some(MovementVector::ZERO)
            }
        }
    }

    pub fn contains(&self, label: PositionLabel) -> bool {
        self.entries.contains_key(&label)
    }

    pub fn insert(&mut self, label: PositionLabel, movement: MovementVector) -> Option<MovementVector> {
        self.entries.insert(label, movement)
    }

    pub fn remove(&mut self, label: PositionLabel) -> Option<MovementVector> {
        self.entries.remove(&label)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PositionLabel, MovementVector)> + '_ {
        self.entries.iter().map(|(label, movement)| (*label, *movement))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_values() {
        let table = MovementTable::default();
        let expected = [
            (PositionLabel::Right, (-0.05, 0.0)),
            (PositionLabel::Left, (0.05, 0.0)),
            (PositionLabel::Top, (0.0, -0.06)),
            (PositionLabel::Bottom, (0.0, 0.07)),
            (PositionLabel::TopRight, (-0.05, -0.06)),
            (PositionLabel::TopLeft, (0.05, -0.06)),
            (PositionLabel::BottomRight, (-0.05, 0.07)),
            (PositionLabel::BottomLeft, (0.05, 0.07)),
        ];
        for (label, (yaw, pitch)) in expected {
            assert_eq!(table.movement_for(label), Some(MovementVector::new(yaw, pitch)), "{label}");
        }
        assert_eq!(table.len(), 10);
    }

    #[test]
    fn test_degenerate_labels_have_no_movement() {
        let table = MovementTable::default();
        assert_eq!(table.movement_for(PositionLabel::Centered), None);
        assert_eq!(table.movement_for(PositionLabel::NotDetected), None);
    }

    #[test]
    fn test_missing_entry_defaults_to_zero() {
        let mut table = MovementTable::default();
        table.remove(PositionLabel::Left);
        assert_eq!(table.movement_for(PositionLabel::Left), Some(MovementVector::ZERO));
        assert_eq!(MovementTable::empty().movement_for(PositionLabel::Top), Some(MovementVector::ZERO));
    }

    #[test]
    fn test_lookup_by_name() {
        let table = MovementTable::default();
        assert_eq!(table.movement_for_name("Top right"), Some(MovementVector::new(-0.05, -0.06)));
        assert_eq!(table.movement_for_name("In the middle"), None);
        assert_eq!(table.movement_for_name("Far away"), Some(MovementVector::ZERO));
    }
}
