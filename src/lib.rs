//! Offline ERP classifier training: epoching, spatial filtering, scaling and
//! logistic regression, with fitted models persisted per subject session.
pub mod config;
pub mod error;
pub mod model;
pub mod session;
pub mod signal;
pub mod types;

pub use config::{Config, EpochConfig, TimeWindow};
pub use error::{PipelineError, Result};
pub use model::{Model, ModelOptions};
pub use session::SessionRef;
pub use signal::{ChannelScaler, ErpFilter, FeatureExtractor, Recording};
pub use types::{Label, Mode};
