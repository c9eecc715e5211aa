use super::actuator::{Actuator, HeadAngles, JointLimits};
use super::session::{Locomotion, Posture, RobotSession};
use crate::camera::FrameSource;
use crate::{Error, Result};
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Everything the simulated body was told to do, in order
#[derive(Debug, Clone, PartialEq)]
pub enum RobotCommand {
    SetAngles { target: HeadAngles, speed: f64 },
    MoveToward { x: f64, y: f64, theta: f64 },
    StopMove,
    GoToPosture { posture: Posture, speed: f64 },
    WakeUp,
    Rest,
}

#[derive(Debug)]
struct SimState {
    angles: HeadAngles,
    velocity: (f64, f64, f64),
    posture: Option<Posture>,
    awake: bool,
    commands: Vec<RobotCommand>,
}

/// In-process head and body.
///
/// Head targets are applied instantly and clipped to the hardware limits, the
/// way the real joint controller clips out-of-range requests.
#[derive(Debug)]
pub struct SimulatedRobot {
    state: Mutex<SimState>,
    limits: JointLimits,
    latency: Duration,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl Default for SimulatedRobot {
    fn default() -> Self {
        Self::new(JointLimits::default())
    }
}

impl SimulatedRobot {
    pub fn new(limits: JointLimits) -> Self {
        Self {
            state: Mutex::new(SimState {
                angles: HeadAngles::default(),
                velocity: (0.0, 0.0, 0.0),
                posture: None,
                awake: false,
                commands: Vec::new(),
            }),
            limits,
            latency: Duration::ZERO,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Delay every call, e.g. to exercise actuator timeouts
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_angles(self, angles: HeadAngles) -> Self {
        self.lock().angles = self.limits.clamp(angles);
        self
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn angles(&self) -> HeadAngles {
        self.lock().angles
    }

    pub fn velocity(&self) -> (f64, f64, f64) {
        self.lock().velocity
    }

    pub fn posture(&self) -> Option<Posture> {
        self.lock().posture
    }

    pub fn is_awake(&self) -> bool {
        self.lock().awake
    }

    pub fn commands(&self) -> Vec<RobotCommand> {
        self.lock().commands.clone()
    }

    /// Head targets sent so far
    pub fn head_targets(&self) -> Vec<HeadAngles> {
        self.lock()
            .commands
            .iter()
            .filter_map(|c| match c {
                RobotCommand::SetAngles { target, .. } => Some(*target),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
    }

    fn check_writes(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Actuator("simulated write failure".to_string()));
        }
        Ok(())
    }

    fn log(&self, command: RobotCommand) -> MutexGuard<'_, SimState> {
        let mut state = self.lock();
        state.commands.push(command);
        state
    }
}

impl Actuator for SimulatedRobot {
    fn get_angles(&self) -> Result<HeadAngles> {
        self.simulate_latency();
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::Actuator("simulated read failure".to_string()));
        }
        Ok(self.lock().angles)
    }

    fn set_angles(&self, target: HeadAngles, speed: f64) -> Result<()> {
        self.simulate_latency();
        self.check_writes()?;
        let mut state = self.log(RobotCommand::SetAngles { target, speed });
        state.angles = self.limits.clamp(target);
        debug!("Simulated head at {:?}", state.angles);
        Ok(())
    }
}

impl Locomotion for SimulatedRobot {
    fn move_toward(&self, x: f64, y: f64, theta: f64) -> Result<()> {
        self.check_writes()?;
        let clip = |v: f64| v.clamp(-1.0, 1.0);
        self.log(RobotCommand::MoveToward { x, y, theta }).velocity = (clip(x), clip(y), clip(theta));
        Ok(())
    }

    fn stop_move(&self) -> Result<()> {
        self.check_writes()?;
        self.log(RobotCommand::StopMove).velocity = (0.0, 0.0, 0.0);
        Ok(())
    }

    fn go_to_posture(&self, posture: Posture, speed: f64) -> Result<()> {
        self.check_writes()?;
        let mut state = self.log(RobotCommand::GoToPosture { posture, speed });
        state.posture = Some(posture);
        state.awake = true;
        info!("Simulated posture {}", posture);
        Ok(())
    }

    fn wake_up(&self) -> Result<()> {
        self.check_writes()?;
        let mut state = self.log(RobotCommand::WakeUp);
        state.awake = true;
        state.posture = Some(Posture::Stand);
        Ok(())
    }

    fn rest(&self) -> Result<()> {
        self.check_writes()?;
        let mut state = self.log(RobotCommand::Rest);
        state.awake = false;
        state.velocity = (0.0, 0.0, 0.0);
        state.posture = Some(Posture::Crouch);
        Ok(())
    }
}

/// Session over a [`SimulatedRobot`] with an optional camera.
///
/// The camera can be subscribed to once; later calls report it unavailable.
pub struct SimulatedSession {
    robot: Arc<SimulatedRobot>,
    video: Mutex<Option<Box<dyn FrameSource>>>,
}

impl SimulatedSession {
    pub fn new(robot: Arc<SimulatedRobot>, video: Option<Box<dyn FrameSource>>) -> Self {
        Self {
            robot,
            video: Mutex::new(video),
        }
    }

    pub fn robot(&self) -> &Arc<SimulatedRobot> {
        &self.robot
    }
}

impl RobotSession for SimulatedSession {
    fn head(&self) -> Result<Arc<dyn Actuator>> {
        Ok(self.robot.clone())
    }

    fn locomotion(&self) -> Result<Arc<dyn Locomotion>> {
        Ok(self.robot.clone())
    }

    fn video(&self) -> Result<Box<dyn FrameSource>> {
        self.video
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| Error::ServiceUnavailable("video device".to_string()))
    }
}
