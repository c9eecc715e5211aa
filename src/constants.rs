//! Constants used throughout the application

/// Side length in pixels of the neutral square centered on the frame
pub const CENTER_BOX: u32 = 150;

/// Frame size assumed when normalizing face boxes (NAO `kQVGA`)
pub const ASSUMED_FRAME_WIDTH: f64 = 320.0;
pub const ASSUMED_FRAME_HEIGHT: f64 = 240.0;

/// Largest absolute pixel coordinate accepted from the detection server
pub const MAX_PIXEL_COORDINATE: f64 = 100_000.0;

/// Number of observations forming one model window
pub const DEFAULT_SEQUENCE_LENGTH: usize = 10;

/// Movement model dimensions
pub const FEATURE_DIM: usize = 4;
pub const MOVEMENT_DIM: usize = 2;
pub const DEFAULT_HIDDEN_SIZE: usize = 64;

/// Adam optimizer defaults
pub const DEFAULT_LEARNING_RATE: f64 = 0.001;
pub const ADAM_BETA1: f64 = 0.9;
pub const ADAM_BETA2: f64 = 0.999;
pub const ADAM_EPSILON: f64 = 1e-8;

/// Seed for weight initialization
pub const DEFAULT_MODEL_SEED: u64 = 42;

/// Head joint limits in radians (NAO `HeadYaw` / `HeadPitch`)
pub const HEAD_YAW_MIN: f64 = -2.0857;
pub const HEAD_YAW_MAX: f64 = 2.0857;
pub const HEAD_PITCH_MIN: f64 = -0.6720;
pub const HEAD_PITCH_MAX: f64 = 0.5149;

/// Fraction of maximum joint speed used for head moves
pub const DEFAULT_MOVEMENT_SPEED: f64 = 0.1;

/// Fraction of maximum speed used for posture transitions
pub const DEFAULT_POSTURE_SPEED: f64 = 0.7;

/// Rule-based corrective steps (radians)
pub const STEP_YAW: f64 = 0.05;
pub const STEP_PITCH_UP: f64 = 0.06;
pub const STEP_PITCH_DOWN: f64 = 0.07;

/// Teleop body velocity as a fraction of maximum walking speed
pub const TELEOP_BODY_SPEED: f64 = 0.5;

/// Robot connection defaults
pub const DEFAULT_ROBOT_ADDRESS: &str = "169.254.196.174";
pub const DEFAULT_ROBOT_PORT: u16 = 9559;
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 3;
pub const DEFAULT_CONNECT_RETRY_MS: u64 = 5000;

/// Thread cadence and deadlines
pub const DEFAULT_CAPTURE_INTERVAL_MS: u64 = 5;
pub const DEFAULT_DETECTION_INTERVAL_MS: u64 = 50;
pub const DEFAULT_ACTUATOR_TIMEOUT_MS: u64 = 500;
pub const DEFAULT_JOIN_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_FRAME_BUFFER_CAPACITY: usize = 10;

/// Detection server defaults
pub const DEFAULT_DETECTOR_URL: &str = "http://127.0.0.1:5000/predict";
pub const DEFAULT_DETECTOR_TIMEOUT_MS: u64 = 2000;
pub const JPEG_QUALITY: u8 = 90;

/// Directory for movement model snapshots
pub const DEFAULT_MODEL_SAVE_DIR: &str = "movement_models";

/// Snapshot file format version
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;
