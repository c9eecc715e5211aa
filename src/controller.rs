//! Head tracking control loop: classify, train or predict, clamp, actuate.

use crate::constants::{ASSUMED_FRAME_HEIGHT, ASSUMED_FRAME_WIDTH, CENTER_BOX, DEFAULT_MODEL_SAVE_DIR};
use crate::detector::DetectionEvent;
use crate::geometry::{CenterBox, FaceBox, NormalizedFeature};
use crate::history::ObservationHistory;
use crate::model::MovementModel;
use crate::movement_policy::MovementVector;
use crate::position::{classify, PositionLabel};
use crate::robot::{HeadAngles, HeadCommander, Locomotion, TeleopCommand};
use crate::Result;
use chrono::NaiveDateTime;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What a detection cycle does with the face position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingMode {
    /// Follow the rule table and learn from it
    Training,
    /// Follow the model's predictions
    #[default]
    Inference,
}

impl fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Training => f.write_str("training"),
            Self::Inference => f.write_str("inference"),
        }
    }
}

/// Outcome of one detection cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    pub label: PositionLabel,
    /// Head target that was commanded, if any
    pub applied: Option<HeadAngles>,
    /// Training loss before this cycle's update
    pub loss: Option<f64>,
    pub prediction: Option<MovementVector>,
}

impl CycleReport {
    const fn idle(label: PositionLabel) -> Self {
        Self {
            label,
            applied: None,
            loss: None,
            prediction: None,
        }
    }
}

/// Snapshot file name for a model with `sample_count` samples saved at `at`
#[must_use]
pub fn snapshot_file_name(sample_count: u64, at: NaiveDateTime) -> String {
    format!(
        "model_samplesize_{}_{}.snapshot",
        sample_count,
        at.format("%Y%m%d_%H%M%S")
    )
}

/// Owns the observation history and the movement model
pub struct HeadTrackingController {
    model: MovementModel,
    history: ObservationHistory,
    head: HeadCommander,
    locomotion: Option<Arc<dyn Locomotion>>,
    mode: TrackingMode,
    center_side: u32,
    assumed_frame: (f64, f64),
    save_dir: PathBuf,
    cycles: u64,
}

impl HeadTrackingController {
    pub fn new(model: MovementModel, head: HeadCommander, mode: TrackingMode) -> Self {
        let history = ObservationHistory::new(model.sequence_length());
        Self {
            model,
            history,
            head,
            locomotion: None,
            mode,
            center_side: CENTER_BOX,
            assumed_frame: (ASSUMED_FRAME_WIDTH, ASSUMED_FRAME_HEIGHT),
            save_dir: PathBuf::from(DEFAULT_MODEL_SAVE_DIR),
            cycles: 0,
        }
    }

    pub fn with_locomotion(mut self, locomotion: Arc<dyn Locomotion>) -> Self {
        self.locomotion = Some(locomotion);
        self
    }

    pub fn with_center_side(mut self, side: u32) -> Self {
        self.center_side = side;
        self
    }

    /// Frame size that face features are normalized against
    pub fn with_assumed_frame(mut self, width: f64, height: f64) -> Self {
        self.assumed_frame = (width, height);
        self
    }

    pub fn with_save_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.save_dir = dir.into();
        self
    }

    pub const fn mode(&self) -> TrackingMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: TrackingMode) {
        self.mode = mode;
    }

    pub const fn model(&self) -> &MovementModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut MovementModel {
        &mut self.model
    }

    pub fn into_model(self) -> MovementModel {
        self.model
    }

    pub const fn history(&self) -> &ObservationHistory {
        &self.history
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Detection cycles handled so far
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Center box for a frame of the given size
    pub fn center_box(&self, frame_width: u32, frame_height: u32) -> CenterBox {
        CenterBox::for_frame(frame_width, frame_height, self.center_side)
    }

    fn normalize(&self, face: &FaceBox) -> NormalizedFeature {
        face.normalize_with(self.assumed_frame.0, self.assumed_frame.1)
    }

    /// Clamp-and-apply; failures are logged and the cycle continues
    pub fn apply_movement(&self, movement: MovementVector) -> Option<HeadAngles> {
        match self.head.apply(movement) {
            Ok(target) => Some(target),
            Err(e) if e.is_transient() => {
                warn!("Error moving head: {}", e);
                None
            }
            Err(e) => {
                error!("Head actuator failed: {}", e);
                None
            }
        }
    }

    /// Run one cycle for the primary face (or none) in `mode`
    pub fn on_detection(
        &mut self,
        face: Option<&FaceBox>,
        center: &CenterBox,
        mode: TrackingMode,
    ) -> CycleReport {
        self.cycles += 1;
        let label = classify(face, center);
        let mut report = CycleReport::idle(label);
        debug!("Cycle {} ({}): face is {}", self.cycles, mode, label);

        let Some(face) = face else {
            return report;
        };

        match mode {
            TrackingMode::Training => {
                if label.is_degenerate() {
                    return report;
                }
                let Some(movement) = self.model.movement_table().movement_for(label) else {
                    return report;
                };
                report.applied = self.apply_movement(movement);
                let feature = self.normalize(face);
                self.model.record(feature, movement);
                report.loss = self.model.train_step();
                if let Some(loss) = report.loss {
                    debug!(
                        "Trained on {} samples, loss {:.6}",
                        self.model.sample_count(),
                        loss
                    );
                }
            }
            TrackingMode::Inference => {
                let feature = self.normalize(face);
                self.history.push(feature);
                if self.history.is_full() {
                    report.prediction = self.model.predict(&self.history.window());
                    if let Some(movement) = report.prediction {
                        report.applied = self.apply_movement(movement);
                    }
                }
            }
        }
        report
    }

    /// Feed a raw detector outcome for a `frame_width`×`frame_height` frame.
    /// Only the first face is tracked; a failed call skips the cycle.
    pub fn on_detection_result(
        &mut self,
        outcome: Result<Vec<FaceBox>>,
        frame_width: u32,
        frame_height: u32,
    ) -> CycleReport {
        match outcome {
            Err(e) => {
                warn!("Detection failed: {}", e);
                CycleReport::idle(PositionLabel::NotDetected)
            }
            Ok(faces) => {
                if faces.is_empty() {
                    debug!("No face detected");
                } else if faces.len() > 1 {
                    debug!("{} faces detected, tracking the first", faces.len());
                }
                let center = self.center_box(frame_width, frame_height);
                self.on_detection(faces.first(), &center, self.mode)
            }
        }
    }

    pub fn handle_event(&mut self, event: DetectionEvent) -> CycleReport {
        self.on_detection_result(event.outcome, event.frame_width, event.frame_height)
    }

    /// Drive the body and nudge the head from an operator command
    pub fn apply_teleop(&self, command: &TeleopCommand) -> Option<HeadAngles> {
        if let Some(locomotion) = &self.locomotion {
            if let Err(e) = command.drive(locomotion.as_ref()) {
                warn!("Error driving body: {}", e);
            }
        }
        if command.has_head_motion() {
            self.apply_movement(command.head)
        } else {
            None
        }
    }

    /// Save the model under `dir` with a sample-count and timestamp file name
    ///
    /// # Errors
    ///
    /// Returns I/O or encoding errors from writing the snapshot
    pub fn save_snapshot(&self, dir: &Path) -> Result<PathBuf> {
        let name = snapshot_file_name(
            self.model.sample_count(),
            chrono::Local::now().naive_local(),
        );
        let path = dir.join(name);
        self.model.save(&path)?;
        info!("Snapshot written to {}", path.display());
        Ok(path)
    }
}
