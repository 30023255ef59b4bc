//! Xdawn spatial filtering.
//!
//! For every class the evoked response covariance is contrasted with the
//! covariance of the whole signal through a generalized symmetric eigenproblem.
//! The leading eigenvectors of each class are stacked into one filter bank that
//! maps (channels x times) epochs onto (classes * components x times).
use nalgebra::{Cholesky, DMatrix, SymmetricEigen};
use ndarray::{s, Array1, Array2, Array3, ArrayBase, ArrayView2, Axis, Data, Ix3};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::types::{unique_labels, Label};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Xdawn {
    n_components: usize,
    classes: Vec<Label>,
    /// (n_classes * n_components, n_channels)
    filters: Option<Array2<f64>>,
}

impl Xdawn {
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components,
            classes: Vec::new(),
            filters: None,
        }
    }
    pub fn n_components(&self) -> usize {
        self.n_components
    }
    pub fn classes(&self) -> &[Label] {
        &self.classes
    }
    pub fn filters(&self) -> Option<&Array2<f64>> {
        self.filters.as_ref()
    }

    pub fn fit<S: Data<Elem = f64>>(&mut self, x: &ArrayBase<S, Ix3>, y: &[Label]) -> Result<()> {
        let (n_epochs, n_channels, _) = x.dim();
        if y.len() != n_epochs {
            return Err(PipelineError::shape(n_epochs, y.len()));
        }
        let classes = unique_labels(y);
        if classes.len() < 2 {
            return Err(PipelineError::InsufficientClasses(classes.len()));
        }
        let n_keep = self.n_components.min(n_channels);
        if n_keep < self.n_components {
            log::debug!(
                "xdawn: {} components requested, only {n_channels} channels available",
                self.n_components
            );
        }

        let whitening = whitening(covariance(concat_epochs(x).view()))?;
        let mut rows: Vec<f64> = Vec::with_capacity(classes.len() * n_keep * n_channels);
        for &class in &classes {
            let members: Vec<usize> = (0..n_epochs).filter(|&i| y[i] == class).collect();
            let evoked = x
                .select(Axis(0), &members)
                .mean_axis(Axis(0))
                .ok_or(PipelineError::InsufficientClasses(classes.len()))?;
            let target = &whitening * covariance(evoked.view()) * whitening.transpose();
            let target = (&target + target.transpose()) * 0.5;
            let SymmetricEigen {
                eigenvalues,
                eigenvectors,
            } = SymmetricEigen::new(target);
            let vectors = whitening.transpose() * eigenvectors;
            let mut order: Vec<usize> = (0..n_channels).collect();
            order.sort_by(|&a, &b| eigenvalues[b].total_cmp(&eigenvalues[a]));
            for &k in order.iter().take(n_keep) {
                let column = vectors.column(k);
                let norm = column.norm();
                if norm == 0.0 || !norm.is_finite() {
                    return Err(PipelineError::NumericInstability(format!(
                        "degenerate xdawn filter for class {class}"
                    )));
                }
                rows.extend(column.iter().map(|v| v / norm));
            }
        }
        let filters = Array2::from_shape_vec((classes.len() * n_keep, n_channels), rows)
            .map_err(|e| PipelineError::NumericInstability(e.to_string()))?;
        log::debug!("xdawn: {} filters for classes {:?}", filters.nrows(), classes);
        self.classes = classes;
        self.filters = Some(filters);
        Ok(())
    }

    pub fn transform<S: Data<Elem = f64>>(&self, x: &ArrayBase<S, Ix3>) -> Result<Array3<f64>> {
        let filters = self.filters.as_ref().ok_or(PipelineError::NotFitted("Xdawn"))?;
        let (n_epochs, n_channels, n_times) = x.dim();
        if filters.ncols() != n_channels {
            return Err(PipelineError::shape(filters.ncols(), n_channels));
        }
        let mut out = Array3::zeros((n_epochs, filters.nrows(), n_times));
        for (mut dst, epoch) in out.outer_iter_mut().zip(x.outer_iter()) {
            dst.assign(&filters.dot(&epoch));
        }
        Ok(out)
    }
}

/// Epochs laid end to end: (n_channels, n_epochs * n_times).
fn concat_epochs<S: Data<Elem = f64>>(x: &ArrayBase<S, Ix3>) -> Array2<f64> {
    let (n_epochs, n_channels, n_times) = x.dim();
    let mut out = Array2::zeros((n_channels, n_epochs * n_times));
    for (i, epoch) in x.outer_iter().enumerate() {
        out.slice_mut(s![.., i * n_times..(i + 1) * n_times]).assign(&epoch);
    }
    out
}

/// Empirical covariance of (variables x observations) data.
fn covariance(data: ArrayView2<f64>) -> DMatrix<f64> {
    let (n_vars, n_obs) = data.dim();
    let mean = data
        .mean_axis(Axis(1))
        .unwrap_or_else(|| Array1::zeros(n_vars))
        .insert_axis(Axis(1));
    let centered = &data - &mean;
    let cov = centered.dot(&centered.t()) / n_obs.max(1) as f64;
    DMatrix::from_fn(n_vars, n_vars, |i, j| cov[[i, j]])
}

/// Inverse Cholesky factor `L^-1` of `cov = L L^T`.
fn whitening(cov: DMatrix<f64>) -> Result<DMatrix<f64>> {
    let n = cov.nrows();
    let chol = Cholesky::new(cov).ok_or_else(|| {
        PipelineError::NumericInstability("signal covariance is not positive definite".into())
    })?;
    chol.l()
        .solve_lower_triangular(&DMatrix::identity(n, n))
        .ok_or_else(|| PipelineError::NumericInstability("singular Cholesky factor".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::PI;

    /// Class 1 epochs carry a half-sine on the first two channels.
    fn erp_epochs(seed: u64, n_epochs: usize) -> (Array3<f64>, Vec<Label>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let labels: Vec<Label> = (0..n_epochs).map(|i| (i % 3 == 0) as Label).collect();
        let weights = [1.0, 0.6, 0.0, 0.0];
        let epochs = Array3::from_shape_fn((n_epochs, 4, 40), |(e, c, t)| {
            let erp = if labels[e] == 1 {
                2.0 * weights[c] * (PI * t as f64 / 40.0).sin()
            } else {
                0.0
            };
            erp + rng.gen_range(-1.0..1.0)
        });
        (epochs, labels)
    }

    #[test]
    fn filters_are_unit_norm_per_class() {
        let (x, y) = erp_epochs(5, 60);
        let mut xdawn = Xdawn::new(2);
        xdawn.fit(&x, &y).unwrap();
        assert_eq!(xdawn.classes(), &[0, 1]);
        let filters = xdawn.filters().unwrap();
        assert_eq!(filters.shape(), &[4, 4]);
        for row in filters.outer_iter() {
            assert_abs_diff_eq!(row.dot(&row), 1.0, epsilon = 1e-9);
        }
        let out = xdawn.transform(&x).unwrap();
        assert_eq!(out.shape(), &[60, 4, 40]);
    }

    #[test]
    fn leading_target_filter_weights_erp_channels() {
        let (x, y) = erp_epochs(9, 90);
        let mut xdawn = Xdawn::new(1);
        xdawn.fit(&x, &y).unwrap();
        // Second row is the leading filter of class 1.
        let target = xdawn.filters().unwrap().row(1).mapv(f64::abs);
        assert!(target[0] + target[1] > target[2] + target[3]);
    }

    #[test]
    fn components_are_capped_by_channel_count() {
        let (x, y) = erp_epochs(1, 30);
        let mut xdawn = Xdawn::new(6);
        xdawn.fit(&x, &y).unwrap();
        assert_eq!(xdawn.filters().unwrap().shape(), &[8, 4]);
    }

    #[test]
    fn needs_two_classes_and_a_fit() {
        let (x, _) = erp_epochs(2, 12);
        let xdawn = Xdawn::new(3);
        assert!(matches!(xdawn.transform(&x), Err(PipelineError::NotFitted("Xdawn"))));
        let mut xdawn = Xdawn::new(3);
        assert!(matches!(
            xdawn.fit(&x, &[1; 12]),
            Err(PipelineError::InsufficientClasses(1))
        ));
    }

    #[test]
    fn flat_signal_is_numerically_unstable() {
        let x = Array3::<f64>::zeros((4, 3, 10));
        let mut xdawn = Xdawn::new(1);
        assert!(matches!(
            xdawn.fit(&x, &[0, 1, 0, 1]),
            Err(PipelineError::NumericInstability(_))
        ));
    }
}
