use thiserror::Error;
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid mode '{0}': expected 'train' or 'test'")]
    InvalidMode(String),
    #[error("unsupported normalization method '{0}'")]
    UnsupportedNormalization(String),
    #[error("unsupported recording type '{0}'")]
    UnsupportedRecordingType(String),
    #[error("an ERP frequency band is required to build the filter")]
    MissingBand,
    #[error("invalid frequency band {band:?} for sample rate {sfreq} Hz")]
    InvalidBand { band: Vec<f64>, sfreq: f64 },
    #[error("signal too short for zero-phase filtering: {len} samples, need more than {pad}")]
    SignalTooShort { len: usize, pad: usize },
    #[error("sample rate must be greater than zero")]
    InvalidSampleRate,
    #[error("invalid time window: {0}")]
    InvalidWindow(String),
    #[error("epoch {index} at sample {timestamp} falls outside the recording ({n_samples} samples)")]
    EpochOutOfBounds {
        index: usize,
        timestamp: usize,
        n_samples: usize,
    },
    #[error("event matrix holds {events} entries but {epochs} epochs were cut")]
    EventMismatch { events: usize, epochs: usize },
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },
    #[error("{0} has not been fitted yet")]
    NotFitted(&'static str),
    #[error("operation '{0}' is not available in this mode")]
    ModeMismatch(&'static str),
    #[error("channel selection requested but no channel indices are set")]
    ChannelSelectionUnset,
    #[error("need at least two classes to fit, got {0}")]
    InsufficientClasses(usize),
    #[error("numerically unstable computation: {0}")]
    NumericInstability(String),
    #[error("no session directory found under {0}")]
    NoSession(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
impl PipelineError {
    pub(crate) fn shape(expected: impl std::fmt::Debug, actual: impl std::fmt::Debug) -> Self {
        PipelineError::ShapeMismatch {
            expected: format!("{expected:?}"),
            actual: format!("{actual:?}"),
        }
    }
}
pub type Result<T> = std::result::Result<T, PipelineError>;
