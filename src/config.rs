// src/config.rs
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Interval in seconds relative to an event onset.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}
impl TimeWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
    /// Offset of `t` seconds from onset, in samples.
    pub fn offset_samples(t: f64, sample_rate_hz: f64) -> isize {
        (t * sample_rate_hz).round() as isize
    }
    pub fn samples(&self, sample_rate_hz: f64) -> usize {
        (Self::offset_samples(self.end, sample_rate_hz)
            - Self::offset_samples(self.start, sample_rate_hz))
        .max(0) as usize
    }
    pub fn contains(&self, other: &TimeWindow) -> bool {
        other.start >= self.start && other.end <= self.end && other.start <= other.end
    }
    /// Sample range of `inner` measured from the start of `self`.
    pub fn sub_range(&self, inner: &TimeWindow, sample_rate_hz: f64) -> std::ops::Range<usize> {
        let origin = Self::offset_samples(self.start, sample_rate_hz);
        let lo = (Self::offset_samples(inner.start, sample_rate_hz) - origin).max(0) as usize;
        let hi = (Self::offset_samples(inner.end, sample_rate_hz) - origin).max(0) as usize;
        lo..hi.min(self.samples(sample_rate_hz))
    }
}
impl From<(f64, f64)> for TimeWindow {
    fn from((start, end): (f64, f64)) -> Self {
        Self::new(start, end)
    }
}
impl From<TimeWindow> for (f64, f64) {
    fn from(w: TimeWindow) -> Self {
        (w.start, w.end)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubjectInfo {
    pub subjname: String,
    #[serde(rename = "type")]
    pub recording_type: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AmpInfo {
    pub samplerate: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OfflineConfig {
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub baseline: Option<TimeWindow>,
    pub time_window: TimeWindow,
    pub downsamp: f64,
    #[serde(default)]
    pub band_erp: Option<Vec<f64>>,
    #[serde(default)]
    pub filter_order: Option<usize>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    pub subj_info: SubjectInfo,
    pub amp_info: AmpInfo,
    pub off_config: OfflineConfig,
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
    pub fn subject_dir(&self, subject: &str) -> PathBuf {
        self.data_dir.join(subject)
    }
    pub fn epoch_config(&self) -> EpochConfig {
        EpochConfig {
            recording_type: self.subj_info.recording_type.clone(),
            cut: TimeWindow::new(self.off_config.start, self.off_config.end),
            baseline: self.off_config.baseline,
            analysis: self.off_config.time_window,
            samplerate: self.amp_info.samplerate,
            downsamp: self.off_config.downsamp,
        }
    }
}

/// Everything `raw2epoch` needs, detached from the on-disk config layout.
#[derive(Clone, Debug, PartialEq)]
pub struct EpochConfig {
    pub recording_type: String,
    pub cut: TimeWindow,
    pub baseline: Option<TimeWindow>,
    pub analysis: TimeWindow,
    pub samplerate: f64,
    pub downsamp: f64,
}
impl EpochConfig {
    /// Configured baseline, else the pre-onset part of the cut window.
    pub fn baseline_window(&self) -> Option<TimeWindow> {
        if self.baseline.is_some() {
            return self.baseline;
        }
        if self.cut.start < 0.0 {
            Some(TimeWindow::new(self.cut.start, self.cut.end.min(0.0)))
        } else {
            None
        }
    }
    /// Decimation stride `floor(samplerate / downsamp)`; must be at least 1.
    pub fn down_ratio(&self) -> Result<usize> {
        let ratio = (self.samplerate / self.downsamp).floor();
        if !ratio.is_finite() || ratio < 1.0 || ratio > isize::MAX as f64 {
            return Err(PipelineError::InvalidWindow(format!(
                "downsample rate {} does not divide sample rate {} into a stride of at least 1",
                self.downsamp, self.samplerate
            )));
        }
        Ok(ratio as usize)
    }
}
