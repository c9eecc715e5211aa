//! Configuration management for the head tracking harness

use crate::constants::*;
use crate::detector::DetectorSettings;
use crate::model::MovementModel;
use crate::robot::JointLimits;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Robot connection and body behavior
    pub robot: RobotConfig,

    /// Head joint limits and speed
    pub joints: JointConfig,

    /// Face position geometry and frame buffering
    pub tracking: TrackingConfig,

    /// Movement model architecture and persistence
    pub model: ModelConfig,

    /// Worker cadences and deadlines
    pub timing: TimingConfig,

    /// Face detection server
    pub detector: DetectorSettings,
}

/// Robot connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    /// Robot IP address or host name
    pub address: String,

    /// Robot service port
    pub port: u16,

    /// Connection attempts before giving up
    pub connect_attempts: u32,

    /// Pause between connection attempts
    pub connect_retry_ms: u64,

    /// Speed fraction for posture changes
    pub posture_speed: f64,

    /// Stop walking and rest when the session stops
    pub rest_on_shutdown: bool,
}

/// Head joint configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JointConfig {
    pub yaw_min: f64,
    pub yaw_max: f64,
    pub pitch_min: f64,
    pub pitch_max: f64,

    /// Fraction of maximum joint speed for head moves (0.0-1.0]
    pub movement_speed: f64,
}

/// Face position configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Side of the neutral center box in pixels
    pub center_box: u32,

    /// Frame size that face features are normalized against
    pub assumed_frame_width: f64,
    pub assumed_frame_height: f64,

    /// Frames kept in the capture buffer
    pub frame_buffer_capacity: usize,
}

/// Movement model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Observations per prediction window
    pub sequence_length: usize,

    /// LSTM hidden units
    pub hidden_size: usize,

    pub learning_rate: f64,

    /// Seed for weight initialization
    pub seed: u64,

    /// Cap on the training log; unbounded when absent
    pub max_training_samples: Option<usize>,

    /// Directory for snapshots
    pub save_dir: PathBuf,

    /// Write a snapshot when the session stops
    pub save_on_exit: bool,
}

/// Worker timing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub capture_interval_ms: u64,
    pub detection_interval_ms: u64,

    /// Deadline for a single actuator call
    pub actuator_timeout_ms: u64,

    /// Deadline for each worker thread to exit on stop
    pub join_timeout_ms: u64,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ROBOT_ADDRESS.to_string(),
            port: DEFAULT_ROBOT_PORT,
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
            connect_retry_ms: DEFAULT_CONNECT_RETRY_MS,
            posture_speed: DEFAULT_POSTURE_SPEED,
            rest_on_shutdown: true,
        }
    }
}

impl Default for JointConfig {
    fn default() -> Self {
        Self {
            yaw_min: HEAD_YAW_MIN,
            yaw_max: HEAD_YAW_MAX,
            pitch_min: HEAD_PITCH_MIN,
            pitch_max: HEAD_PITCH_MAX,
            movement_speed: DEFAULT_MOVEMENT_SPEED,
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            center_box: CENTER_BOX,
            assumed_frame_width: ASSUMED_FRAME_WIDTH,
            assumed_frame_height: ASSUMED_FRAME_HEIGHT,
            frame_buffer_capacity: DEFAULT_FRAME_BUFFER_CAPACITY,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            sequence_length: DEFAULT_SEQUENCE_LENGTH,
            hidden_size: DEFAULT_HIDDEN_SIZE,
            learning_rate: DEFAULT_LEARNING_RATE,
            seed: DEFAULT_MODEL_SEED,
            max_training_samples: None,
            save_dir: PathBuf::from(DEFAULT_MODEL_SAVE_DIR),
            save_on_exit: false,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            capture_interval_ms: DEFAULT_CAPTURE_INTERVAL_MS,
            detection_interval_ms: DEFAULT_DETECTION_INTERVAL_MS,
            actuator_timeout_ms: DEFAULT_ACTUATOR_TIMEOUT_MS,
            join_timeout_ms: DEFAULT_JOIN_TIMEOUT_MS,
        }
    }
}

impl JointConfig {
    pub const fn limits(&self) -> JointLimits {
        JointLimits {
            yaw_min: self.yaw_min,
            yaw_max: self.yaw_max,
            pitch_min: self.pitch_min,
            pitch_max: self.pitch_max,
        }
    }
}

impl TimingConfig {
    pub const fn capture_interval(&self) -> Duration {
        Duration::from_millis(self.capture_interval_ms)
    }

    pub const fn detection_interval(&self) -> Duration {
        Duration::from_millis(self.detection_interval_ms)
    }

    pub const fn actuator_timeout(&self) -> Duration {
        Duration::from_millis(self.actuator_timeout_ms)
    }

    pub const fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

impl RobotConfig {
    pub const fn connect_retry(&self) -> Duration {
        Duration::from_millis(self.connect_retry_ms)
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        serde_yaml::from_str(&content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to a YAML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// Create an untrained movement model from configuration
    pub fn create_model(&self) -> MovementModel {
        MovementModel::new(
            self.model.sequence_length,
            self.model.hidden_size,
            self.model.learning_rate,
            self.model.seed,
        )
        .with_log_cap(self.model.max_training_samples)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        // Joint limits
        self.joints.limits().validate()?;
        if !(self.joints.movement_speed > 0.0 && self.joints.movement_speed <= 1.0) {
            return Err(Error::ConfigError(
                "Movement speed must be in (0.0, 1.0]".to_string(),
            ));
        }
        if !(self.robot.posture_speed > 0.0 && self.robot.posture_speed <= 1.0) {
            return Err(Error::ConfigError(
                "Posture speed must be in (0.0, 1.0]".to_string(),
            ));
        }

        // Geometry
        if self.tracking.center_box == 0 {
            return Err(Error::ConfigError("Center box side must be greater than 0".to_string()));
        }
        if !(self.tracking.assumed_frame_width > 0.0 && self.tracking.assumed_frame_height > 0.0) {
            return Err(Error::ConfigError(
                "Assumed frame size must be positive".to_string(),
            ));
        }

        // Model
        if self.model.sequence_length == 0 {
            return Err(Error::ConfigError(
                "Sequence length must be greater than 0".to_string(),
            ));
        }
        if self.model.hidden_size == 0 {
            return Err(Error::ConfigError("Hidden size must be greater than 0".to_string()));
        }
        if !(self.model.learning_rate > 0.0 && self.model.learning_rate.is_finite()) {
            return Err(Error::ConfigError("Learning rate must be positive".to_string()));
        }

        // Timing
        if self.timing.actuator_timeout_ms == 0 {
            return Err(Error::ConfigError(
                "Actuator timeout must be greater than 0".to_string(),
            ));
        }
        if self.robot.connect_attempts == 0 {
            return Err(Error::ConfigError(
                "Connect attempts must be greater than 0".to_string(),
            ));
        }

        // Detector
        if !(self.detector.url.starts_with("http://") || self.detector.url.starts_with("https://")) {
            return Err(Error::ConfigError(format!(
                "Detector URL must be http(s): {}",
                self.detector.url
            )));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Robot Head Tracking Configuration

# Robot connection
robot:
  address: "169.254.196.174"
  port: 9559
  connect_attempts: 3
  connect_retry_ms: 5000
  posture_speed: 0.7
  rest_on_shutdown: true

# Head joint limits (radians) and speed fraction
joints:
  yaw_min: -2.0857
  yaw_max: 2.0857
  pitch_min: -0.672
  pitch_max: 0.5149
  movement_speed: 0.1

# Face position geometry
tracking:
  center_box: 150
  assumed_frame_width: 320.0
  assumed_frame_height: 240.0
  frame_buffer_capacity: 10

# Movement model
model:
  sequence_length: 10
  hidden_size: 64
  learning_rate: 0.001
  seed: 42
  max_training_samples: null
  save_dir: "movement_models"
  save_on_exit: false

# Worker timing
timing:
  capture_interval_ms: 5
  detection_interval_ms: 50
  actuator_timeout_ms: 500
  join_timeout_ms: 1000

# Face detection server
detector:
  url: "http://127.0.0.1:5000/predict"
  timeout_ms: 2000
  mode: "face"
"#;
