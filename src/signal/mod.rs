// src/signal/mod.rs
pub mod epochs;
pub mod filter;
pub mod scaler;
pub mod source;
pub mod spectrum;
pub use epochs::{apply_baseline, cut_epochs, detrend, event_order, raw2epoch, sort_epochs, time_window};
pub use filter::{ErpFilter, FeatureExtractor, FilterKind};
pub use scaler::{ChannelScaler, NormMethod};
pub use source::{JsonRecordingSource, ManualSource, Recording, RecordingSource};
pub use spectrum::FrequencyResponse;
