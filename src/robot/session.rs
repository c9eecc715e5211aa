use super::actuator::Actuator;
use crate::camera::FrameSource;
use crate::{Error, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Predefined whole-body postures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Posture {
    Stand,
    StandInit,
    StandZero,
    Sit,
    Crouch,
}

impl Posture {
    /// Name understood by the robot's posture service
    pub const fn name(self) -> &'static str {
        match self {
            Self::Stand => "Stand",
            Self::StandInit => "StandInit",
            Self::StandZero => "StandZero",
            Self::Sit => "Sit",
            Self::Crouch => "Crouch",
        }
    }
}

impl fmt::Display for Posture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Body motion and stiffness control
pub trait Locomotion: Send + Sync {
    /// Walk with normalized velocities in `[-1, 1]`
    fn move_toward(&self, x: f64, y: f64, theta: f64) -> Result<()>;

    fn stop_move(&self) -> Result<()>;

    fn go_to_posture(&self, posture: Posture, speed: f64) -> Result<()>;

    /// Stiffen joints and stand
    fn wake_up(&self) -> Result<()>;

    /// Crouch and release stiffness
    fn rest(&self) -> Result<()>;
}

/// Connected robot exposing its services.
///
/// Each service is looked up independently; a robot without a camera still
/// offers head control.
pub trait RobotSession: Send + Sync {
    fn head(&self) -> Result<Arc<dyn Actuator>>;

    fn locomotion(&self) -> Result<Arc<dyn Locomotion>>;

    /// Subscribe to the camera. The returned source is released by its owner.
    fn video(&self) -> Result<Box<dyn FrameSource>>;
}

/// Call `connect` up to `attempts` times, sleeping `delay` between failures.
/// The attempt number (starting at 1) is passed to the connector.
///
/// # Errors
///
/// Returns `Error::Connection` carrying the last failure once attempts are exhausted
pub fn connect_with_retry<S, F>(attempts: u32, delay: Duration, mut connect: F) -> Result<S>
where
    F: FnMut(u32) -> Result<S>,
{
    let attempts = attempts.max(1);
    let mut last_error = None;
    for attempt in 1..=attempts {
        match connect(attempt) {
            Ok(session) => {
                info!("Connected to robot on attempt {}", attempt);
                return Ok(session);
            }
            Err(e) => {
                warn!("Connection attempt {}/{} failed: {}", attempt, attempts, e);
                last_error = Some(e);
                if attempt < attempts {
                    thread::sleep(delay);
                }
            }
        }
    }
    Err(Error::Connection(format!(
        "Failed to connect after {} attempts: {}",
        attempts,
        last_error.map_or_else(|| "no attempt made".to_string(), |e| e.to_string())
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_succeeds_after_retry() {
        let mut calls = 0;
        let result = connect_with_retry(3, Duration::ZERO, |attempt| {
            calls += 1;
            if attempt < 2 {
                Err(Error::Connection("refused".to_string()))
            } else {
                Ok(attempt)
            }
        });
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_connect_gives_up() {
        let mut calls = 0;
        let result: Result<()> = connect_with_retry(3, Duration::ZERO, |_| {
            calls += 1;
            Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "refused",
            )))
        });
        assert!(matches!(result, Err(Error::Connection(msg)) if msg.contains("3 attempts")));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        let result = connect_with_retry(0, Duration::ZERO, |attempt| Ok(attempt));
        assert_eq!(result.unwrap(), 1);
    }

    #[test]
    fn test_posture_names() {
        assert_eq!(Posture::StandZero.to_string(), "StandZero");
        assert_eq!(Posture::Crouch.name(), "Crouch");
    }
}
