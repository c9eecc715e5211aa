use crate::constants::{
    DEFAULT_MOVEMENT_SPEED, HEAD_PITCH_MAX, HEAD_PITCH_MIN, HEAD_YAW_MAX, HEAD_YAW_MIN,
};
use crate::movement_policy::MovementVector;
use crate::{Error, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Absolute head joint angles in radians
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HeadAngles {
    pub yaw: f64,
    pub pitch: f64,
}

impl HeadAngles {
    pub const fn new(yaw: f64, pitch: f64) -> Self {
        Self { yaw, pitch }
    }

    /// Offset by a movement vector
    pub fn offset(self, movement: MovementVector) -> Self {
        Self::new(self.yaw + movement.yaw, self.pitch + movement.pitch)
    }
}

/// Closed joint ranges for the head
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointLimits {
    pub yaw_min: f64,
    pub yaw_max: f64,
    pub pitch_min: f64,
    pub pitch_max: f64,
}

impl Default for JointLimits {
    fn default() -> Self {
        Self {
            yaw_min: HEAD_YAW_MIN,
            yaw_max: HEAD_YAW_MAX,
            pitch_min: HEAD_PITCH_MIN,
            pitch_max: HEAD_PITCH_MAX,
        }
    }
}

impl JointLimits {
    /// Clamp both joints into range; NaN maps to the lower bound
    pub fn clamp(&self, angles: HeadAngles) -> HeadAngles {
        HeadAngles::new(
            clamp_joint(angles.yaw, self.yaw_min, self.yaw_max),
            clamp_joint(angles.pitch, self.pitch_min, self.pitch_max),
        )
    }

    pub fn contains(&self, angles: HeadAngles) -> bool {
        (self.yaw_min..=self.yaw_max).contains(&angles.yaw)
            && (self.pitch_min..=self.pitch_max).contains(&angles.pitch)
    }

    /// # Errors
    ///
    /// Returns `Error::ConfigError` for empty or non-finite ranges
    pub fn validate(&self) -> Result<()> {
        let finite = [self.yaw_min, self.yaw_max, self.pitch_min, self.pitch_max]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.yaw_min > self.yaw_max || self.pitch_min > self.pitch_max {
            return Err(Error::ConfigError(format!("Invalid joint limits: {self:?}")));
        }
        Ok(())
    }
}

fn clamp_joint(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    }
}

/// Head actuator sink
pub trait Actuator: Send + Sync {
    /// Read current `HeadYaw` / `HeadPitch`
    fn get_angles(&self) -> Result<HeadAngles>;

    /// Move to absolute angles at a fraction of maximum speed
    fn set_angles(&self, target: HeadAngles, speed: f64) -> Result<()>;
}

/// Clamp-and-apply for relative head movements
#[derive(Clone)]
pub struct HeadCommander {
    actuator: Arc<dyn Actuator>,
    limits: JointLimits,
    speed: f64,
}

impl HeadCommander {
    pub fn new(actuator: Arc<dyn Actuator>, limits: JointLimits, speed: f64) -> Self {
        Self { actuator, limits, speed }
    }

    pub fn with_defaults(actuator: Arc<dyn Actuator>) -> Self {
        Self::new(actuator, JointLimits::default(), DEFAULT_MOVEMENT_SPEED)
    }

    pub const fn limits(&self) -> &JointLimits {
        &self.limits
    }

    pub const fn speed(&self) -> f64 {
        self.speed
    }

    /// Read the current angles, add `movement`, clamp, and command the result.
    /// Returns the target that was sent.
    ///
    /// # Errors
    ///
    /// Propagates actuator read/write failures and timeouts
    pub fn apply(&self, movement: MovementVector) -> Result<HeadAngles> {
        let current = self.actuator.get_angles()?;
        let target = self.limits.clamp(current.offset(movement));
        debug!(
            "Head move ({:+.3}, {:+.3}) -> yaw {:.4} pitch {:.4}",
            movement.yaw, movement.pitch, target.yaw, target.pitch
        );
        self.actuator.set_angles(target, self.speed)?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_limits() {
        let limits = JointLimits::default();
        assert_eq!(limits.clamp(HeadAngles::new(3.0, 1.0)), HeadAngles::new(2.0857, 0.5149));
        assert_eq!(limits.clamp(HeadAngles::new(-3.0, -1.0)), HeadAngles::new(-2.0857, -0.6720));
        assert!(limits.validate().is_ok());
    }

    #[test]
    fn test_nan_clamps_to_lower_bound() {
        let limits = JointLimits::default();
        let clamped = limits.clamp(HeadAngles::new(f64::NAN, f64::NAN));
        assert!(limits.contains(clamped));
    }

    #[test]
    fn test_invalid_limits() {
        let limits = JointLimits {
            yaw_min: 1.0,
            yaw_max: -1.0,
            ..JointLimits::default()
        };
        assert!(limits.validate().is_err());
    }

    proptest! {
        #[test]
        fn clamp_stays_in_range(yaw in -100.0f64..100.0, pitch in -100.0f64..100.0) {
            let limits = JointLimits::default();
            let clamped = limits.clamp(HeadAngles::new(yaw, pitch));
            prop_assert!((-2.0857..=2.0857).contains(&clamped.yaw));
            prop_assert!((-0.6720..=0.5149).contains(&clamped.pitch));
        }
    }
}
