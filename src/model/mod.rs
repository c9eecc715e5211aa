//! Learned movement model.
//!
//! A single-layer LSTM reads a window of normalized face features (oldest
//! first) and regresses the corrective head movement for the newest frame.
//! The same instance is trained online and used for inference; which one
//! happens depends only on the operation called.

/// Recurrent network parameters, forward pass and backpropagation through time
pub mod lstm;

/// Adam optimizer
pub mod optim;

/// Persisted model bundle
pub mod snapshot;

use crate::constants::{FEATURE_DIM, MOVEMENT_DIM};
use crate::geometry::NormalizedFeature;
use crate::movement_policy::{MovementTable, MovementVector};
use crate::Result;
use log::{debug, info, warn};
use lstm::LstmParams;
use ndarray::{Array1, Array2};
use optim::Adam;
use serde::{Deserialize, Serialize};
use snapshot::ModelSnapshot;
use std::collections::VecDeque;
use std::path::Path;

/// One labeled observation: where the face was and how the head was moved
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub feature: NormalizedFeature,
    pub movement: MovementVector,
}

/// Outcome of [`MovementModel::restore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub success: bool,
    pub sample_count: u64,
}

/// Sequence regressor from face features to head movement
pub struct MovementModel {
    params: LstmParams,
    optimizer: Adam,
    sequence_length: usize,
    training_log: VecDeque<TrainingSample>,
    log_cap: Option<usize>,
    sample_count: u64,
    movement_table: MovementTable,
}

fn window_matrix(features: &[NormalizedFeature]) -> Array2<f64> {
    Array2::from_shape_fn((features.len(), FEATURE_DIM), |(row, col)| {
        features[row].to_array()[col]
    })
}

impl MovementModel {
    /// Create an untrained model
    pub fn new(sequence_length: usize, hidden_size: usize, learning_rate: f64, seed: u64) -> Self {
        let params = LstmParams::init(FEATURE_DIM, hidden_size, MOVEMENT_DIM, seed);
        let optimizer = Adam::new(&params, learning_rate);
        Self {
            params,
            optimizer,
            sequence_length,
            training_log: VecDeque::new(),
            log_cap: None,
            sample_count: 0,
            movement_table: MovementTable::default(),
        }
    }

    /// Bound the training log; the oldest samples are evicted past `cap`.
    /// A cap below the sequence length would starve training and is raised to it.
    pub fn with_log_cap(mut self, cap: Option<usize>) -> Self {
        self.log_cap = cap.map(|c| c.max(self.sequence_length));
        self
    }

    pub const fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    pub fn hidden_size(&self) -> usize {
        self.params.hidden_size()
    }

    /// Samples recorded over the model's lifetime, including restored ones
    pub const fn sample_count(&self) -> u64 {
        self.sample_count
    }

    pub fn training_log(&self) -> impl ExactSizeIterator<Item = &TrainingSample> {
        self.training_log.iter()
    }

    pub fn training_log_len(&self) -> usize {
        self.training_log.len()
    }

    pub const fn movement_table(&self) -> &MovementTable {
        &self.movement_table
    }

    pub fn set_movement_table(&mut self, table: MovementTable) {
        self.movement_table = table;
    }

    pub const fn optimizer_steps(&self) -> u64 {
        self.optimizer.steps()
    }

    /// Append a labeled sample to the training log
    pub fn record(&mut self, feature: NormalizedFeature, movement: MovementVector) {
        self.training_log.push_back(TrainingSample { feature, movement });
        self.sample_count += 1;
        if let Some(cap) = self.log_cap {
            while self.training_log.len() > cap {
                self.training_log.pop_front();
                debug!("Training log at cap {}, evicted oldest sample", cap);
            }
        }
    }

    /// One optimizer step on the most recent window.
    ///
    /// The input is the features of the last `sequence_length` samples; the
    /// target is the movement of the last sample only. Returns the MSE loss
    /// measured before the update, or `None` while the log is too short.
    pub fn train_step(&mut self) -> Option<f64> {
        let len = self.training_log.len();
        if self.sequence_length == 0 || len < self.sequence_length {
            return None;
        }

        let recent: Vec<NormalizedFeature> = self
            .training_log
            .range(len - self.sequence_length..)
            .map(|sample| sample.feature)
            .collect();
        let target = Array1::from(self.training_log.back()?.movement.to_array().to_vec());

        let inputs = window_matrix(&recent);
        let pass = self.params.forward(inputs.view());
        let error = pass.output() - &target;
        let loss = error.mapv(|e| e * e).mean().unwrap_or(0.0);

        let d_output = error.mapv(|e| 2.0 * e / MOVEMENT_DIM as f64);
        let grads = self.params.backward(&pass, &d_output);
        self.optimizer.step(&mut self.params, &grads);

        Some(loss)
    }

    /// Predict the corrective movement for a window, oldest observation first
    pub fn predict(&self, window: &[NormalizedFeature]) -> Option<MovementVector> {
        if self.sequence_length == 0 || window.len() < self.sequence_length {
            return None;
        }
        let inputs = window_matrix(window);
        let output = self.params.forward(inputs.view()).output().clone();
        Some(MovementVector::new(output[0], output[1]))
    }

    fn snapshot(&self) -> ModelSnapshot {
        ModelSnapshot {
            format_version: crate::constants::SNAPSHOT_FORMAT_VERSION,
            params: self.params.clone(),
            optimizer: self.optimizer.clone(),
            sample_count: self.sample_count,
            training_log: self.training_log.iter().copied().collect(),
            movement_table: self.movement_table.clone(),
        }
    }

    /// Persist parameters, optimizer state, sample count, training log and movement table
    ///
    /// # Errors
    ///
    /// Returns I/O or encoding errors
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.snapshot().write(path)?;
        info!(
            "Saved movement model to {} ({} samples)",
            path.display(),
            self.sample_count
        );
        Ok(())
    }

    /// Replace this model's state with a snapshot, including its movement table.
    /// Returns the restored sample count.
    ///
    /// # Errors
    ///
    /// Returns decoding errors or `Error::ModelShape` when the snapshot was
    /// taken with a different architecture; the model is left untouched on error
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<u64> {
        let path = path.as_ref();
        let snapshot = ModelSnapshot::read(path)?;
        let hidden = self.params.hidden_size();
        snapshot.params.validate(FEATURE_DIM, hidden, MOVEMENT_DIM)?;
        snapshot.optimizer.validate(FEATURE_DIM, hidden, MOVEMENT_DIM)?;

        self.params = snapshot.params;
        self.optimizer = snapshot.optimizer;
        self.sample_count = snapshot.sample_count;
        self.training_log = snapshot.training_log.into();
        self.movement_table = snapshot.movement_table;
        info!(
            "Loaded movement model from {} ({} samples)",
            path.display(),
            self.sample_count
        );
        Ok(self.sample_count)
    }

    /// [`load`](Self::load) reporting failure as `success = false, sample_count = 0`
    pub fn restore<P: AsRef<Path>>(&mut self, path: P) -> LoadReport {
        match self.load(path.as_ref()) {
            Ok(sample_count) => LoadReport {
                success: true,
                sample_count,
            },
            Err(e) => {
                warn!("Error loading model {}: {}", path.as_ref().display(), e);
                LoadReport {
                    success: false,
                    sample_count: 0,
                }
            }
        }
    }
}
