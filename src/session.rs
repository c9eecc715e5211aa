//! Tracking session: wires the robot, detector and controller together and
//! owns the capture, detection and control threads.

use crate::camera::{CaptureWorker, FrameBuffer};
use crate::config::Config;
use crate::controller::{CycleReport, HeadTrackingController, TrackingMode};
use crate::detector::{DetectionEvent, DetectionWorker, Detector};
use crate::model::MovementModel;
use crate::position::PositionLabel;
use crate::robot::{
    Actuator, HeadCommander, Locomotion, Posture, RobotSession, TeleopCommand, TimedActuator,
};
use crate::{Error, Result};
use crossbeam_channel::{bounded, select, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Detection results waiting for the control thread; newer ones are dropped past this
const DETECTION_QUEUE: usize = 1;
const COMMAND_QUEUE: usize = 16;
/// Control thread wake-up interval when idle
const CONTROL_POLL: Duration = Duration::from_millis(20);
const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

/// Requests handled on the control thread
pub enum ControlEvent {
    Teleop(TeleopCommand),
    SaveSnapshot(Sender<Result<PathBuf>>),
    Stats(Sender<SessionStats>),
}

/// Running totals reported by the control thread
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SessionStats {
    pub cycles: u64,
    pub sample_count: u64,
    pub last_label: Option<PositionLabel>,
    pub last_loss: Option<f64>,
    pub moves_applied: u64,
}

impl SessionStats {
    fn record(&mut self, report: &CycleReport, sample_count: u64) {
        self.cycles += 1;
        self.sample_count = sample_count;
        self.last_label = Some(report.label);
        if report.loss.is_some() {
            self.last_loss = report.loss;
        }
        if report.applied.is_some() {
            self.moves_applied += 1;
        }
    }
}

/// A named thread whose exit can be awaited with a deadline
struct Worker<T> {
    name: &'static str,
    handle: JoinHandle<T>,
    done: Receiver<()>,
}

impl<T: Send + 'static> Worker<T> {
    fn spawn<F>(name: &'static str, body: F) -> Result<Self>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (done_tx, done) = bounded::<()>(0);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                // Disconnects `done` on return or unwind
                let _done = done_tx;
                body()
            })
            .map_err(|e| Error::Session(format!("Failed to spawn {name} thread: {e}")))?;
        Ok(Self { name, handle, done })
    }

    /// Join if the thread exits within `timeout`, otherwise detach it
    fn join(self, timeout: Duration) -> Option<T> {
        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => match self.handle.join() {
                Ok(value) => {
                    debug!("{} thread joined", self.name);
                    Some(value)
                }
                Err(_) => {
                    error!("{} thread panicked", self.name);
                    None
                }
            },
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "{} thread did not stop within {:?}, detaching",
                    self.name, timeout
                );
                None
            }
        }
    }
}

fn run_control(
    mut controller: HeadTrackingController,
    detections: Receiver<DetectionEvent>,
    commands: Receiver<ControlEvent>,
    shutdown: Arc<AtomicBool>,
) -> HeadTrackingController {
    let mut stats = SessionStats::default();
    info!("Control loop started in {} mode", controller.mode());

    let mut connected = true;
    while connected && !shutdown.load(Ordering::SeqCst) {
        select! {
            recv(detections) -> event => match event {
                Ok(event) => {
                    let report = controller.handle_event(event);
                    stats.record(&report, controller.model().sample_count());
                }
                Err(_) => connected = false,
            },
            recv(commands) -> command => match command {
                Ok(ControlEvent::Teleop(teleop)) => {
                    controller.apply_teleop(&teleop);
                }
                Ok(ControlEvent::SaveSnapshot(reply)) => {
                    let dir = controller.save_dir().to_path_buf();
                    let saved = controller.save_snapshot(&dir);
                    if let Err(e) = &saved {
                        error!("Failed to save snapshot: {}", e);
                    }
                    let _ = reply.send(saved);
                }
                Ok(ControlEvent::Stats(reply)) => {
                    let _ = reply.send(stats);
                }
                Err(_) => connected = false,
            },
            default(CONTROL_POLL) => {}
        }
    }
    info!(
        "Control loop stopped after {} cycles ({} samples)",
        stats.cycles, stats.sample_count
    );
    controller
}

/// Running head tracking session
pub struct TrackingSession {
    shutdown: Arc<AtomicBool>,
    buffer: Arc<FrameBuffer>,
    commands: Sender<ControlEvent>,
    capture: Option<Worker<u64>>,
    detection: Option<Worker<u64>>,
    control: Option<Worker<HeadTrackingController>>,
    locomotion: Option<Arc<dyn Locomotion>>,
    posture_speed: f64,
    rest_on_shutdown: bool,
    save_on_exit: bool,
    join_timeout: Duration,
    stopped: bool,
}

impl TrackingSession {
    /// Look up the robot's services and start the worker threads.
    ///
    /// Head control and video are required; locomotion is optional.
    ///
    /// # Errors
    ///
    /// Returns configuration errors, missing required services, or thread spawn failures
    pub fn start(
        config: &Config,
        robot: &dyn RobotSession,
        detector: Box<dyn Detector>,
        model: MovementModel,
        mode: TrackingMode,
    ) -> Result<Self> {
        config.validate()?;

        let head = robot.head()?;
        let locomotion = match robot.locomotion() {
            Ok(locomotion) => Some(locomotion),
            Err(e) => {
                warn!("Locomotion unavailable, body control disabled: {}", e);
                None
            }
        };
        if let Some(locomotion) = &locomotion {
            match locomotion.wake_up() {
                Ok(()) => info!("Robot awake"),
                Err(e) => warn!("Failed to wake robot: {}", e),
            }
        }

        let actuator: Arc<dyn Actuator> =
            Arc::new(TimedActuator::spawn(head, config.timing.actuator_timeout())?);
        let commander =
            HeadCommander::new(actuator, config.joints.limits(), config.joints.movement_speed);
        let mut controller = HeadTrackingController::new(model, commander, mode)
            .with_center_side(config.tracking.center_box)
            .with_assumed_frame(
                config.tracking.assumed_frame_width,
                config.tracking.assumed_frame_height,
            )
            .with_save_dir(config.model.save_dir.clone());
        if let Some(locomotion) = &locomotion {
            controller = controller.with_locomotion(locomotion.clone());
        }

        let video = robot.video()?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let buffer = Arc::new(FrameBuffer::new(config.tracking.frame_buffer_capacity));
        let (detection_tx, detection_rx) = bounded(DETECTION_QUEUE);
        let (commands, command_rx) = bounded(COMMAND_QUEUE);

        let capture_worker = CaptureWorker::new(
            video,
            buffer.clone(),
            config.timing.capture_interval(),
            shutdown.clone(),
        );
        let detection_worker = DetectionWorker::new(
            detector,
            config.detector.mode,
            buffer.clone(),
            detection_tx,
            config.timing.detection_interval(),
            shutdown.clone(),
        );

        let control_shutdown = shutdown.clone();
        let control = Worker::spawn("control", move || {
            run_control(controller, detection_rx, command_rx, control_shutdown)
        })?;
        let capture = Worker::spawn("capture", move || capture_worker.run())?;
        let detection = Worker::spawn("detection", move || detection_worker.run())?;

        info!(
            "Tracking session started ({} mode, detector mode {})",
            mode, config.detector.mode
        );
        Ok(Self {
            shutdown,
            buffer,
            commands,
            capture: Some(capture),
            detection: Some(detection),
            control: Some(control),
            locomotion,
            posture_speed: config.robot.posture_speed,
            rest_on_shutdown: config.robot.rest_on_shutdown,
            save_on_exit: config.model.save_on_exit,
            join_timeout: config.timing.join_timeout(),
            stopped: false,
        })
    }

    pub fn is_running(&self) -> bool {
        !self.stopped
    }

    pub fn frame_buffer(&self) -> &Arc<FrameBuffer> {
        &self.buffer
    }

    fn send(&self, event: ControlEvent) -> Result<()> {
        match self.commands.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(Error::Session("control queue full".to_string())),
            Err(TrySendError::Disconnected(_)) => {
                Err(Error::Session("control loop not running".to_string()))
            }
        }
    }

    /// Queue an operator command for the control thread
    ///
    /// # Errors
    ///
    /// Returns `Error::Session` when the control loop is busy or stopped
    pub fn submit_teleop(&self, command: TeleopCommand) -> Result<()> {
        self.send(ControlEvent::Teleop(command))
    }

    /// Save a snapshot from the control thread and wait for its path
    ///
    /// # Errors
    ///
    /// Returns the save error, or `Error::Session` if the control loop does not answer
    pub fn request_snapshot(&self) -> Result<PathBuf> {
        let (reply, response) = bounded(1);
        self.send(ControlEvent::SaveSnapshot(reply))?;
        response
            .recv_timeout(REPLY_TIMEOUT)
            .map_err(|_| Error::Session("no reply to snapshot request".to_string()))?
    }

    /// Current totals, or `None` if the control loop does not answer
    pub fn stats(&self) -> Option<SessionStats> {
        let (reply, response) = bounded(1);
        self.send(ControlEvent::Stats(reply)).ok()?;
        response.recv_timeout(REPLY_TIMEOUT).ok()
    }

    /// # Errors
    ///
    /// Returns `Error::ServiceUnavailable` without locomotion, or the robot's error
    pub fn go_to_posture(&self, posture: Posture) -> Result<()> {
        let locomotion = self
            .locomotion
            .as_ref()
            .ok_or_else(|| Error::ServiceUnavailable("locomotion".to_string()))?;
        info!("Going to posture {}", posture);
        locomotion.go_to_posture(posture, self.posture_speed)
    }

    /// Stop all threads and return the controller if the control thread
    /// exited in time. Later calls do nothing and return `None`.
    pub fn stop(&mut self) -> Option<HeadTrackingController> {
        if self.stopped {
            return None;
        }
        self.stopped = true;
        info!("Stopping tracking session");
        self.shutdown.store(true, Ordering::SeqCst);

        if let Some(capture) = self.capture.take() {
            capture.join(self.join_timeout);
        }
        if let Some(detection) = self.detection.take() {
            detection.join(self.join_timeout);
        }
        let controller = self
            .control
            .take()
            .and_then(|control| control.join(self.join_timeout));
        self.buffer.clear();

        if self.save_on_exit {
            if let Some(controller) = &controller {
                if let Err(e) = controller.save_snapshot(controller.save_dir()) {
                    error!("Failed to save snapshot on exit: {}", e);
                }
            }
        }

        if self.rest_on_shutdown {
            if let Some(locomotion) = &self.locomotion {
                if let Err(e) = locomotion.stop_move().and_then(|()| locomotion.rest()) {
                    warn!("Error resting robot: {}", e);
                }
            }
        }
        info!("Tracking session stopped");
        controller
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_join_returns_value() {
        let worker = Worker::spawn("test", || 7).unwrap();
        assert_eq!(worker.join(Duration::from_secs(1)), Some(7));
    }

    #[test]
    fn test_worker_join_detaches_slow_thread() {
        let worker = Worker::spawn("slow", || thread::sleep(Duration::from_millis(300))).unwrap();
        assert_eq!(worker.join(Duration::from_millis(10)), None);
    }

    #[test]
    fn test_panicking_worker_yields_none() {
        let worker: Worker<()> = Worker::spawn("panics", || panic!("boom")).unwrap();
        assert_eq!(worker.join(Duration::from_secs(1)), None);
    }

    #[test]
    fn test_stats_record() {
        let mut stats = SessionStats::default();
        let report = CycleReport {
            label: PositionLabel::Right,
            applied: None,
            loss: Some(0.5),
            prediction: None,
        };
        stats.record(&report, 3);
        assert_eq!(stats.cycles, 1);
        assert_eq!(stats.sample_count, 3);
        assert_eq!(stats.last_loss, Some(0.5));
        assert_eq!(stats.moves_applied, 0);
    }
}
