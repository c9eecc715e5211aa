//! Classification of a face position relative to the neutral center box.

use crate::geometry::{CenterBox, FaceBox};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where the face sits relative to the center box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PositionLabel {
    Right,
    Left,
    Top,
    Bottom,
    TopRight,
    TopLeft,
    BottomRight,
    BottomLeft,
    Centered,
    NotDetected,
}

impl PositionLabel {
    /// Every label, corrective ones first
    pub const ALL: [Self; 10] = [
        Self::Right,
        Self::Left,
        Self::Top,
        Self::Bottom,
        Self::TopRight,
        Self::TopLeft,
        Self::BottomRight,
        Self::BottomLeft,
        Self::Centered,
        Self::NotDetected,
    ];

    /// Labels with no corrective movement
        pub const fn is_degenerate(self) -> bool {
        matches!(self, Self::Centered | Self::NotDetected)
    }

    /// Operator-facing name
        pub const fn name(self) -> &'static str {
        match self {
            Self::Right => "Right",
            Self::Left => "Left",
            Self::Top => "Middle top",
            Self::Bottom => "Middle bottom",
            Self::TopRight => "Top right",
            Self::TopLeft => "Top left",
            Self::BottomRight => "Bottom right",
            Self::BottomLeft => "Bottom left",
            Self::Centered => "In the middle",
            Self::NotDetected => "Not detected",
        }
    }
}

impl fmt::Display for PositionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PositionLabel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|label| label.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidInput(format!("Unknown position label: {s}")))
    }
}

/// Classify a face box against the center box.
///
/// The first midpoint coordinate is the horizontal center `(left + right) / 2`,
/// floored to a whole pixel, and is compared with the corners' x components; the second is the vertical
/// center and is compared with their y components. Conditions are evaluated in
/// a fixed order with strict inequalities, so a midpoint lying exactly on an
/// edge falls through to `Centered`.
pub fn classify(face: Option<&FaceBox>, center: &CenterBox) -> PositionLabel {
    let Some(face) = face else {
        return PositionLabel::NotDetected;
    };

    let (mid_a, mid_b) = face.midpoint();
    let (tl_x, tl_y) = center.top_left;
    let (br_x, br_y) = center.bottom_right;

    if mid_a > br_x && mid_b > tl_y && mid_b < br_y {
        PositionLabel::Right
    } else if mid_a > br_x && mid_b > br_y {
        PositionLabel::BottomRight
    } else if mid_a > br_x && mid_b < tl_y {
        PositionLabel::TopRight
    } else if mid_a > tl_x && mid_a < br_x && mid_b < tl_y {
        PositionLabel::Top
    } else if mid_a > tl_x && mid_a < br_x && mid_b > br_y {
        PositionLabel::Bottom
    } else if mid_a < tl_x && mid_b > tl_y && mid_b < br_y {
        PositionLabel::Left
    } else if mid_a < tl_x && mid_b > br_y {
        PositionLabel::BottomLeft
    } else if mid_a < tl_x && mid_b < tl_y {
        PositionLabel::TopLeft
    } else {
        PositionLabel::Centered
    }
}
