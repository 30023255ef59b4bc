// src/model/mod.rs
pub mod coef;
pub mod logistic;
pub mod pipeline;
pub mod stage;
pub mod vectorizer;
pub mod wrapper;
pub mod xdawn;

pub use coef::{CoefficientStore, Coefficients, CHANNEL_INDEX_KEY};
pub use logistic::LogisticRegression;
pub use pipeline::{Estimator, Pipeline, Transform};
pub use stage::{ErpPipeline, PipelineBuilder, Stage};
pub use vectorizer::Vectorizer;
pub use wrapper::{InferenceModel, Model, ModelOptions, TrainingModel, COEF_FILE, MODEL_FILE};
pub use xdawn::Xdawn;
