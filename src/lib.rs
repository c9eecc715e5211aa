//! Head tracking for a humanoid robot driven by remote face detection.
//!
//! Camera frames are streamed from the robot, an external inference server
//! returns face bounding boxes, and a control loop turns each detection into a
//! head movement:
//! 1. Classify the face position against a neutral center box
//! 2. In training mode, look up a fixed corrective movement, apply it and learn
//!    from it online
//! 3. In inference mode, let a small recurrent model predict the movement from
//!    a short history of observations
//! 4. Clamp to joint limits and send to the head actuators
//!
//! # Examples
//!
//! ## Classifying a Face
//!
//! ```
//! use robot_head_tracking::geometry::{CenterBox, FaceBox};
//! use robot_head_tracking::position::{classify, PositionLabel};
//! use robot_head_tracking::movement_policy::MovementTable;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let center = CenterBox::for_frame(320, 240, 150);
//! let face = FaceBox::new(100, 360, 140, 260)?;
//!
//! let label = classify(Some(&face), &center);
//! assert_eq!(label, PositionLabel::Right);
//!
//! let movement = MovementTable::default().movement_for(label);
//! println!("Move head by {:?}", movement);
//! # Ok(())
//! # }
//! ```
//!
//! ## Running a Session
//!
//! ```no_run
//! use robot_head_tracking::{
//!     camera::ImageDirSource,
//!     config::Config,
//!     controller::TrackingMode,
//!     detector::HttpDetector,
//!     robot::{SimulatedRobot, SimulatedSession},
//!     session::TrackingSession,
//! };
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let frames = ImageDirSource::open("frames", true)?;
//! let robot = SimulatedSession::new(Arc::new(SimulatedRobot::default()), Some(Box::new(frames)));
//! let detector = HttpDetector::new(&config.detector)?;
//!
//! let mut session = TrackingSession::start(
//!     &config,
//!     &robot,
//!     Box::new(detector),
//!     config.create_model(),
//!     TrackingMode::Training,
//! )?;
//! std::thread::sleep(std::time::Duration::from_secs(10));
//! let path = session.request_snapshot()?;
//! println!("Saved {}", path.display());
//! session.stop();
//! # Ok(())
//! # }
//! ```

/// Face boxes, the center box and feature normalization
pub mod geometry;

/// Face position classification
pub mod position;

/// Rule-based movement table
pub mod movement_policy;

/// Bounded observation history
pub mod history;

/// Recurrent movement model with online training and snapshots
pub mod model;

/// Head tracking control loop
pub mod controller;

/// Robot actuator, locomotion and session interfaces
pub mod robot;

/// Frame sources and the shared frame buffer
pub mod camera;

/// Face detection client and worker
pub mod detector;

/// Thread orchestration for a running session
pub mod session;

/// Error types and result handling
pub mod error;

/// Constants used throughout the application
pub mod constants;

/// Configuration management
pub mod config;

pub use error::{Error, Result};
