// src/types.rs
use std::fmt;
use std::str::FromStr;

use crate::error::PipelineError;

/// Class label attached to one epoch.
pub type Label = i64;

/// Sorted distinct labels.
pub fn unique_labels(y: &[Label]) -> Vec<Label> {
    let mut classes = y.to_vec();
    classes.sort_unstable();
    classes.dedup();
    classes
}

// 模型生命周期模式
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Mode {
    Train,
    Test,
}

impl FromStr for Mode {
    type Err = PipelineError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "train" => Ok(Mode::Train),
            "test" => Ok(Mode::Test),
            _ => Err(PipelineError::InvalidMode(s.to_owned())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Train => f.write_str("train"),
            Mode::Test => f.write_str("test"),
        }
    }
}

// 采集模态，目前只支持 EEG
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum RecordingType {
    Eeg,
}

impl FromStr for RecordingType {
    type Err = PipelineError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "eeg" => Ok(RecordingType::Eeg),
            _ => Err(PipelineError::UnsupportedRecordingType(s.to_owned())),
        }
    }
}
