use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::types::Label;

/// One continuous recording session with its event markers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Recording {
    pub sample_rate_hz: f64,
    pub data: Array2<f64>, // channels x samples
    /// Onset sample index of every event, in arrival order.
    pub timestamps: Vec<usize>,
    /// trials x repetitions-per-trial
    pub events: Array2<i64>,
    /// Per-epoch class labels in event-matrix order; absent for unlabeled data.
    #[serde(default)]
    pub labels: Option<Vec<Label>>,
}
impl Recording {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate_hz <= 0.0 {
            return Err(PipelineError::InvalidSampleRate);
        }
        if self.events.len() != self.timestamps.len() {
            return Err(PipelineError::EventMismatch {
                events: self.events.len(),
                epochs: self.timestamps.len(),
            });
        }
        if let Some(labels) = &self.labels {
            if labels.len() != self.timestamps.len() {
                return Err(PipelineError::shape(self.timestamps.len(), labels.len()));
            }
        }
        Ok(())
    }
    pub fn num_channels(&self) -> usize {
        self.data.nrows()
    }
    pub fn samples_per_channel(&self) -> usize {
        self.data.ncols()
    }
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples_per_channel() as f64 / self.sample_rate_hz)
    }
}
/// Trait representing something that can yield recordings on demand.
pub trait RecordingSource {
    fn next_recording(&mut self) -> Result<Option<Recording>>;
}
/// Hands out recordings already held in memory, oldest first.
pub struct ManualSource {
    queue: VecDeque<Recording>,
}
impl ManualSource {
    pub fn new(recordings: impl IntoIterator<Item = Recording>) -> Self {
        Self {
            queue: recordings.into_iter().collect(),
        }
    }
}
impl RecordingSource for ManualSource {
    fn next_recording(&mut self) -> Result<Option<Recording>> {
        Ok(self.queue.pop_front())
    }
}
/// Reads a single JSON-serialized [`Recording`], validating it on load.
pub struct JsonRecordingSource {
    path: PathBuf,
    consumed: bool,
}
impl JsonRecordingSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            consumed: false,
        }
    }
}
impl RecordingSource for JsonRecordingSource {
    fn next_recording(&mut self) -> Result<Option<Recording>> {
        if self.consumed {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)?;
        let recording: Recording = serde_json::from_str(&text)?;
        recording.validate()?;
        self.consumed = true;
        log::info!(
            "loaded {} ({} channels, {:.1} s, {} events)",
            self.path.display(),
            recording.num_channels(),
            recording.duration().as_secs_f64(),
            recording.timestamps.len()
        );
        Ok(Some(recording))
    }
}
