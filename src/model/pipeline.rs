use ndarray::{Array2, ArrayD, Ix2};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::types::Label;

/// Intermediate pipeline stage.
pub trait Transform {
    fn name(&self) -> &'static str;
    fn fit(&mut self, x: &ArrayD<f64>, y: &[Label]) -> Result<()>;
    fn transform(&self, x: &ArrayD<f64>) -> Result<ArrayD<f64>>;
}

/// Terminal stage working on flat (n_samples, n_features) input.
pub trait Estimator {
    fn fit(&mut self, x: &Array2<f64>, y: &[Label]) -> Result<()>;
    fn decision_function(&self, x: &Array2<f64>) -> Result<Array2<f64>>;
}

/// Ordered, named stages followed by an estimator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pipeline<T, E> {
    steps: Vec<(String, T)>,
    estimator: (String, E),
}

impl<T: Transform, E: Estimator> Pipeline<T, E> {
    pub fn new(name: impl Into<String>, estimator: E) -> Self {
        Self {
            steps: Vec::new(),
            estimator: (name.into(), estimator),
        }
    }

    /// Appends a stage after the existing ones.
    pub fn with_step(mut self, name: impl Into<String>, step: T) -> Self {
        self.steps.push((name.into(), step));
        self
    }

    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.steps
            .iter()
            .map(|(name, _)| name.as_str())
            .chain(std::iter::once(self.estimator.0.as_str()))
    }

    pub fn steps(&self) -> impl Iterator<Item = &T> {
        self.steps.iter().map(|(_, step)| step)
    }

    pub fn estimator(&self) -> &E {
        &self.estimator.1
    }

    pub fn fit(&mut self, x: ArrayD<f64>, y: &[Label]) -> Result<()> {
        let mut data = x;
        for (name, step) in &mut self.steps {
            step.fit(&data, y)?;
            data = step.transform(&data)?;
            log::debug!("{name} ({}): output shape {:?}", step.name(), data.shape());
        }
        self.estimator.1.fit(&flat(data)?, y)
    }

    /// Runs every intermediate stage, not the estimator.
    pub fn transform(&self, x: ArrayD<f64>) -> Result<ArrayD<f64>> {
        self.steps
            .iter()
            .try_fold(x, |data, (_, step)| step.transform(&data))
    }

    pub fn decision_function(&self, x: ArrayD<f64>) -> Result<Array2<f64>> {
        let data = self.transform(x)?;
        self.estimator.1.decision_function(&flat(data)?)
    }
}

fn flat(data: ArrayD<f64>) -> Result<Array2<f64>> {
    let shape = data.shape().to_vec();
    data.into_dimensionality::<Ix2>()
        .map_err(|_| PipelineError::shape("(n_samples, n_features)", shape))
}
