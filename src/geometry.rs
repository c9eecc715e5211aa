//! Face boxes, the neutral center box and feature normalization.

use crate::constants::{ASSUMED_FRAME_HEIGHT, ASSUMED_FRAME_WIDTH};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Face rectangle in source-image pixels, in detector order `(top, right, bottom, left)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    top: i32,
    right: i32,
    bottom: i32,
    left: i32,
}

impl FaceBox {
    /// Create a face box, rejecting inverted coordinates
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `right < left` or `bottom < top`
    pub fn new(top: i32, right: i32, bottom: i32, left: i32) -> Result<Self> {
        if right < left {
            return Err(Error::InvalidInput(format!(
                "face box right edge {right} is left of left edge {left}"
            )));
        }
        if bottom < top {
            return Err(Error::InvalidInput(format!(
                "face box bottom edge {bottom} is above top edge {top}"
            )));
        }
        Ok(Self { top, right, bottom, left })
    }

    /// Build from the `[top, right, bottom, left]` array the detection server emits
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for inverted coordinates
    pub fn from_locations(location: [i32; 4]) -> Result<Self> {
        let [top, right, bottom, left] = location;
        Self::new(top, right, bottom, left)
    }

    pub const fn top(&self) -> i32 {
        self.top
    }

    pub const fn right(&self) -> i32 {
        self.right
    }

    pub const fn bottom(&self) -> i32 {
        self.bottom
    }

    pub const fn left(&self) -> i32 {
        self.left
    }

    pub const fn width(&self) -> i64 {
        self.right as i64 - self.left as i64
    }

    pub const fn height(&self) -> i64 {
        self.bottom as i64 - self.top as i64
    }

    /// Midpoint as `(horizontal, vertical)`, floored to whole pixels
    pub const fn midpoint(&self) -> (i64, i64) {
        (
            (self.left as i64 + self.right as i64).div_euclid(2),
            (self.top as i64 + self.bottom as i64).div_euclid(2),
        )
    }

    /// Normalize against the fixed assumed frame size
    pub fn normalize(&self) -> NormalizedFeature {
        self.normalize_with(ASSUMED_FRAME_WIDTH, ASSUMED_FRAME_HEIGHT)
    }

    /// Normalize against an explicit frame size
    pub fn normalize_with(&self, frame_width: f64, frame_height: f64) -> NormalizedFeature {
        let center_x = (f64::from(self.left) + f64::from(self.right)) / 2.0;
        let center_y = (f64::from(self.top) + f64::from(self.bottom)) / 2.0;
        NormalizedFeature {
            center_x: center_x / frame_width,
            center_y: center_y / frame_height,
            width: (f64::from(self.right) - f64::from(self.left)) / frame_width,
            height: (f64::from(self.bottom) - f64::from(self.top)) / frame_height,
        }
    }
}

/// Neutral region of the frame, corners given as `(x, y)` in whole pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CenterBox {
    pub top_left: (i64, i64),
    pub bottom_right: (i64, i64),
}

impl CenterBox {
    pub const fn new(top_left: (i64, i64), bottom_right: (i64, i64)) -> Self {
        Self { top_left, bottom_right }
    }

    /// Square of `side` pixels centered on a `width`×`height` frame.
    /// Halves are floored, so odd sizes shift the box up and left.
    pub const fn for_frame(width: u32, height: u32, side: u32) -> Self {
        let mid_w = width as i64 / 2;
        let mid_h = height as i64 / 2;
        let half = side as i64 / 2;
        Self {
            top_left: (mid_w - half, mid_h - half),
            bottom_right: (mid_w + half, mid_h + half),
        }
    }
}

/// Face position features, each relative to the assumed frame size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedFeature {
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedFeature {
    pub const fn new(center_x: f64, center_y: f64, width: f64, height: f64) -> Self {
        Self { center_x, center_y, width, height }
    }

    pub const fn to_array(self) -> [f64; 4] {
        [self.center_x, self.center_y, self.width, self.height]
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rejects_inverted_boxes() {
        assert!(FaceBox::new(10, 5, 20, 10).is_err());
        assert!(FaceBox::new(30, 20, 10, 0).is_err());
        assert!(FaceBox::new(10, 10, 10, 10).is_ok());
    }

    #[test]
    fn test_from_locations_order() {
        let face = FaceBox::from_locations([50, 200, 150, 100]).unwrap();
        assert_eq!(face.top(), 50);
        assert_eq!(face.right(), 200);
        assert_eq!(face.bottom(), 150);
        assert_eq!(face.left(), 100);
        assert_eq!(face.midpoint(), (150, 100));
    }

    #[test]
    fn test_normalize() {
        let face = FaceBox::new(60, 200, 180, 120).unwrap();
        let feature = face.normalize();
        assert!((feature.center_x - 0.5).abs() < 1e-12);
        assert!((feature.center_y - 0.5).abs() < 1e-12);
        assert!((feature.width - 0.25).abs() < 1e-12);
        assert!((feature.height - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_center_box_for_qvga() {
        let center = CenterBox::for_frame(320, 240, 150);
        assert_eq!(center.top_left, (85, 45));
        assert_eq!(center.bottom_right, (235, 195));
    }

    #[test]
    fn test_center_box_floors_odd_sizes() {
        let center = CenterBox::for_frame(321, 241, 151);
        assert_eq!(center.top_left, (85, 45));
        assert_eq!(center.bottom_right, (235, 195));
    }

    #[test]
    fn test_midpoint_floors_odd_sums() {
        assert_eq!(FaceBox::new(100, 237, 140, 234).unwrap().midpoint(), (235, 120));
        assert_eq!(FaceBox::new(-3, 0, 0, -1).unwrap().midpoint(), (-1, -2));
    }

    #[test]
    fn test_extreme_coordinates_do_not_overflow() {
        let face = FaceBox::new(i32::MIN, i32::MAX, i32::MAX, i32::MIN).unwrap();
        assert_eq!(face.width(), i64::from(i32::MAX) - i64::from(i32::MIN));
        assert_eq!(face.midpoint(), (-1, -1));
        assert!(face.normalize().is_finite());
    }

    proptest! {
        #[test]
        fn normalized_features_in_unit_range(
            left in 0i32..320,
            top in 0i32..240,
            w in 0i32..320,
            h in 0i32..240,
        ) {
            let right = (left + w).min(320);
            let bottom = (top + h).min(240);
            let feature = FaceBox::new(top, right, bottom, left).unwrap().normalize();
            for value in feature.to_array() {
                prop_assert!((0.0..=1.0).contains(&value));
            }
        }
    }
}
