use ndarray::{ArrayD, ArrayView3, Ix3};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::model::logistic::LogisticRegression;
use crate::model::pipeline::{Pipeline, Transform};
use crate::model::vectorizer::Vectorizer;
use crate::model::xdawn::Xdawn;
use crate::signal::scaler::ChannelScaler;
use crate::types::Label;

/// The fixed ERP classification chain.
pub type ErpPipeline = Pipeline<Stage, LogisticRegression>;

/// Every intermediate stage the ERP chain uses.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Stage {
    Xdawn(Xdawn),
    Scaler(ChannelScaler),
    Vectorizer(Vectorizer),
}

fn epochs(x: &ArrayD<f64>) -> Result<ArrayView3<'_, f64>> {
    x.view()
        .into_dimensionality::<Ix3>()
        .map_err(|_| PipelineError::shape("(n_epochs, n_channels, n_times)", x.shape()))
}

impl Transform for Stage {
    fn name(&self) -> &'static str {
        match self {
            Stage::Xdawn(_) => "xdawn",
            Stage::Scaler(_) => "channelscaler",
            Stage::Vectorizer(_) => "vectorizer",
        }
    }

    fn fit(&mut self, x: &ArrayD<f64>, y: &[Label]) -> Result<()> {
        match self {
            Stage::Xdawn(xdawn) => xdawn.fit(&epochs(x)?, y),
            Stage::Scaler(scaler) => scaler.fit(&epochs(x)?).map(|_| ()),
            Stage::Vectorizer(vectorizer) => vectorizer.fit(x),
        }
    }

    fn transform(&self, x: &ArrayD<f64>) -> Result<ArrayD<f64>> {
        Ok(match self {
            Stage::Xdawn(xdawn) => xdawn.transform(&epochs(x)?)?.into_dyn(),
            Stage::Scaler(scaler) => scaler.transform(&epochs(x)?)?.into_dyn(),
            Stage::Vectorizer(vectorizer) => vectorizer.transform(x)?.into_dyn(),
        })
    }
}

/// Hyper-parameters of an unfitted [`ErpPipeline`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PipelineBuilder {
    pub c: f64,
    pub n_components: usize,
}

impl PipelineBuilder {
    pub fn new(c: f64, n_components: usize) -> Self {
        Self { c, n_components }
    }

    /// Xdawn -> channel scaler -> vectorizer -> logistic regression.
    pub fn build(&self) -> Result<ErpPipeline> {
        Ok(Pipeline::new("logisticregression", LogisticRegression::new(self.c))
            .with_step("xdawn", Stage::Xdawn(Xdawn::new(self.n_components)))
            .with_step("channelscaler", Stage::Scaler(ChannelScaler::new("channel")?))
            .with_step("vectorizer", Stage::Vectorizer(Vectorizer::new())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn builds_the_named_chain() {
        let pipeline = PipelineBuilder::new(1.0, 3).build().unwrap();
        assert_eq!(
            pipeline.step_names().collect::<Vec<_>>(),
            ["xdawn", "channelscaler", "vectorizer", "logisticregression"]
        );
        let kinds: Vec<_> = pipeline.steps().map(Transform::name).collect();
        assert_eq!(kinds, ["xdawn", "channelscaler", "vectorizer"]);
    }

    #[test]
    fn epoch_stages_reject_flat_input() {
        let mut stage = Stage::Scaler(ChannelScaler::new("dim").unwrap());
        let flat = ndarray::Array2::<f64>::zeros((3, 4)).into_dyn();
        assert!(matches!(
            stage.fit(&flat, &[0, 1, 0]),
            Err(PipelineError::ShapeMismatch { .. })
        ));
        let cube = Array3::from_shape_fn((3, 2, 4), |(e, c, t)| (e + c * t) as f64).into_dyn();
        stage.fit(&cube, &[0, 1, 0]).unwrap();
        assert_eq!(stage.transform(&cube).unwrap().shape(), &[3, 2, 4]);
    }
}
