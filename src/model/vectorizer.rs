use ndarray::{Array2, ArrayD, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Flattens (n_samples, ...) data into (n_samples, n_features).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Vectorizer {
    features_shape: Option<Vec<usize>>,
}

impl Vectorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn features_shape(&self) -> Option<&[usize]> {
        self.features_shape.as_deref()
    }

    pub fn fit(&mut self, x: &ArrayD<f64>) -> Result<()> {
        if x.ndim() < 1 {
            return Err(PipelineError::shape("(n_samples, ...)", x.shape()));
        }
        self.features_shape = Some(x.shape()[1..].to_vec());
        Ok(())
    }

    pub fn transform(&self, x: &ArrayD<f64>) -> Result<Array2<f64>> {
        let expected = self
            .features_shape
            .as_deref()
            .ok_or(PipelineError::NotFitted("Vectorizer"))?;
        if x.ndim() < 1 || &x.shape()[1..] != expected {
            return Err(PipelineError::shape(expected, x.shape()));
        }
        let n_samples = x.len_of(Axis(0));
        let n_features = expected.iter().product::<usize>();
        x.as_standard_layout()
            .into_owned()
            .into_shape((n_samples, n_features))
            .map_err(|_| PipelineError::shape((n_samples, n_features), x.shape()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array3};

    #[test]
    fn flattens_trailing_axes_row_major() {
        let x = Array3::from_shape_fn((2, 2, 3), |(e, c, t)| (e * 100 + c * 10 + t) as f64).into_dyn();
        let mut vectorizer = Vectorizer::new();
        vectorizer.fit(&x).unwrap();
        assert_eq!(vectorizer.features_shape(), Some(&[2, 3][..]));
        let flat = vectorizer.transform(&x).unwrap();
        assert_eq!(
            flat,
            array![
                [0.0, 1.0, 2.0, 10.0, 11.0, 12.0],
                [100.0, 101.0, 102.0, 110.0, 111.0, 112.0]
            ]
        );
    }

    #[test]
    fn rejects_other_feature_shapes() {
        let mut vectorizer = Vectorizer::new();
        vectorizer.fit(&Array3::<f64>::zeros((4, 2, 3)).into_dyn()).unwrap();
        let other = Array3::<f64>::zeros((4, 3, 2)).into_dyn();
        assert!(matches!(
            vectorizer.transform(&other),
            Err(PipelineError::ShapeMismatch { .. })
        ));
    }
}
