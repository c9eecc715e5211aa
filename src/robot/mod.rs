//! Robot-side collaborators: head actuator, locomotion, session and tele-operation.

pub mod actuator;
pub mod session;
pub mod simulated;
pub mod teleop;
pub mod timed;

pub use actuator::{Actuator, HeadAngles, HeadCommander, JointLimits};
pub use session::{connect_with_retry, Locomotion, Posture, RobotSession};
pub use simulated::{RobotCommand, SimulatedRobot, SimulatedSession};
pub use teleop::{Key, KeyState, TeleopCommand};
pub use timed::TimedActuator;
