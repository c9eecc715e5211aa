use super::actuator::{Actuator, HeadAngles};
use crate::{Error, Result};
use crossbeam_channel::{bounded, SendTimeoutError, Sender};
use log::{debug, warn};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

enum ActuatorCommand {
    GetAngles(Sender<Result<HeadAngles>>),
    SetAngles {
        target: HeadAngles,
        speed: f64,
        reply: Sender<Result<()>>,
    },
}

/// Runs actuator calls on a dedicated thread so callers wait at most `timeout`.
///
/// Calls are handed over only when the worker is idle. A caller that finds the
/// worker still busy with an abandoned call waits for it within the same
/// deadline, and on expiry its own call is never delivered.
pub struct TimedActuator {
    commands: Sender<ActuatorCommand>,
    timeout: Duration,
}

impl TimedActuator {
    /// Spawn the worker thread around `inner`
    ///
    /// # Errors
    ///
    /// Returns `Error::Session` if the thread cannot be spawned
    pub fn spawn(inner: Arc<dyn Actuator>, timeout: Duration) -> Result<Self> {
        let (commands, rx) = bounded::<ActuatorCommand>(0);
        thread::Builder::new()
            .name("actuator".to_string())
            .spawn(move || {
                for command in rx {
                    match command {
                        ActuatorCommand::GetAngles(reply) => {
                            let _ = reply.send(inner.get_angles());
                        }
                        ActuatorCommand::SetAngles { target, speed, reply } => {
                            let _ = reply.send(inner.set_angles(target, speed));
                        }
                    }
                }
                debug!("Actuator worker exiting");
            })
            .map_err(|e| Error::Session(format!("Failed to spawn actuator worker: {e}")))?;
        Ok(Self { commands, timeout })
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    fn call<T>(&self, make: impl FnOnce(Sender<Result<T>>) -> ActuatorCommand) -> Result<T> {
        let deadline = Instant::now() + self.timeout;
        let (reply, response) = bounded(1);
        match self.commands.send_deadline(make(reply), deadline) {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(_)) => {
                warn!("Actuator busy with a previous call");
                return Err(Error::ActuatorTimeout(self.timeout));
            }
            Err(SendTimeoutError::Disconnected(_)) => {
                return Err(Error::Actuator("actuator worker stopped".to_string()));
            }
        }
        response
            .recv_deadline(deadline)
            .map_err(|_| Error::ActuatorTimeout(self.timeout))?
    }
}

impl Actuator for TimedActuator {
    fn get_angles(&self) -> Result<HeadAngles> {
        self.call(ActuatorCommand::GetAngles)
    }

    fn set_angles(&self, target: HeadAngles, speed: f64) -> Result<()> {
        self.call(|reply| ActuatorCommand::SetAngles { target, speed, reply })
    }
}
