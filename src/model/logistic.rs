//! L2-regularized logistic regression with balanced class weights.
//!
//! Mirrors the liblinear primal formulation: the intercept is an extra feature
//! of constant 1 and is penalized like every other weight. Each binary problem
//! minimizes `0.5 * |w|^2 + sum_i C_i * log(1 + exp(-y_i * w.x_i))` with a
//! damped Newton method.
use nalgebra::{Cholesky, DMatrix, DVector};
use ndarray::{concatenate, s, Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::model::pipeline::Estimator;
use crate::types::{unique_labels, Label};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogisticRegression {
    c: f64,
    tol: f64,
    max_iter: usize,
    classes: Vec<Label>,
    /// (n_models, n_features); one model for binary problems, one per class otherwise.
    coef: Option<Array2<f64>>,
    intercept: Option<Array1<f64>>,
}

impl LogisticRegression {
    pub fn new(c: f64) -> Self {
        Self {
            c,
            tol: 1e-6,
            max_iter: 100,
            classes: Vec::new(),
            coef: None,
            intercept: None,
        }
    }
    pub fn with_tolerance(mut self, tol: f64, max_iter: usize) -> Self {
        self.tol = tol;
        self.max_iter = max_iter;
        self
    }
    pub fn c(&self) -> f64 {
        self.c
    }
    pub fn classes(&self) -> &[Label] {
        &self.classes
    }
    pub fn coef(&self) -> Option<&Array2<f64>> {
        self.coef.as_ref()
    }
    pub fn intercept(&self) -> Option<&Array1<f64>> {
        self.intercept.as_ref()
    }

    /// Class predicted for each row.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<Label>> {
        let scores = self.decision_function(x)?;
        Ok(scores
            .outer_iter()
            .map(|row| {
                if row.len() == 1 {
                    self.classes[(row[0] > 0.0) as usize]
                } else {
                    let best = row
                        .iter()
                        .enumerate()
                        .max_by(|a, b| a.1.total_cmp(b.1))
                        .map_or(0, |(k, _)| k);
                    self.classes[best]
                }
            })
            .collect())
    }
}

impl Estimator for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &[Label]) -> Result<()> {
        let n_samples = x.nrows();
        if y.len() != n_samples {
            return Err(PipelineError::shape(n_samples, y.len()));
        }
        let classes = unique_labels(y);
        if classes.len() < 2 {
            return Err(PipelineError::InsufficientClasses(classes.len()));
        }
        // Balanced weights: n_samples / (n_classes * class_count).
        let weights: Vec<f64> = classes
            .iter()
            .map(|&k| {
                let count = y.iter().filter(|&&l| l == k).count();
                n_samples as f64 / (classes.len() * count) as f64
            })
            .collect();
        let weight_of = |label: Label| weights[classes.binary_search(&label).unwrap_or(0)];

        // (positive class, C for positives, C for negatives)
        let problems: Vec<(Label, f64, f64)> = if classes.len() == 2 {
            vec![(classes[1], self.c * weights[1], self.c * weights[0])]
        } else {
            classes
                .iter()
                .zip(&weights)
                .map(|(&k, &w)| (k, self.c * w, self.c))
                .collect()
        };

        let augmented = concatenate![Axis(1), x.view(), Array2::ones((n_samples, 1))];
        let mut coef = Array2::zeros((problems.len(), x.ncols()));
        let mut intercept = Array1::zeros(problems.len());
        for (row, &(positive, c_pos, c_neg)) in problems.iter().enumerate() {
            let targets: Array1<f64> = y
                .iter()
                .map(|&l| if l == positive { 1.0 } else { -1.0 })
                .collect();
            let costs: Array1<f64> = y
                .iter()
                .map(|&l| if l == positive { c_pos } else { c_neg })
                .collect();
            log::debug!(
                "logistic: class {positive} vs rest, C+ {c_pos:.3}, C- {c_neg:.3} (weight {:.3})",
                weight_of(positive)
            );
            let w = newton(&augmented, targets.view(), costs.view(), self.tol, self.max_iter)?;
            coef.row_mut(row).assign(&w.slice(s![..x.ncols()]));
            intercept[row] = w[x.ncols()];
        }
        self.classes = classes;
        self.coef = Some(coef);
        self.intercept = Some(intercept);
        Ok(())
    }

    fn decision_function(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (Some(coef), Some(intercept)) = (&self.coef, &self.intercept) else {
            return Err(PipelineError::NotFitted("LogisticRegression"));
        };
        if x.ncols() != coef.ncols() {
            return Err(PipelineError::shape(coef.ncols(), x.ncols()));
        }
        Ok(x.dot(&coef.t()) + intercept)
    }
}

/// `log(1 + exp(-m))` without overflow.
fn log_loss(m: f64) -> f64 {
    if m > 0.0 {
        (-m).exp().ln_1p()
    } else {
        -m + m.exp().ln_1p()
    }
}

fn sigmoid(m: f64) -> f64 {
    if m >= 0.0 {
        1.0 / (1.0 + (-m).exp())
    } else {
        let e = m.exp();
        e / (1.0 + e)
    }
}

fn objective(x: &Array2<f64>, y: ArrayView1<f64>, cost: ArrayView1<f64>, w: &Array1<f64>) -> f64 {
    let margins = x.dot(w) * &y;
    0.5 * w.dot(w)
        + margins
            .iter()
            .zip(cost.iter())
            .map(|(&m, &c)| c * log_loss(m))
            .sum::<f64>()
}

fn newton(
    x: &Array2<f64>,
    y: ArrayView1<f64>,
    cost: ArrayView1<f64>,
    tol: f64,
    max_iter: usize,
) -> Result<Array1<f64>> {
    let n_features = x.ncols();
    let mut w = Array1::<f64>::zeros(n_features);
    let mut f = objective(x, y, cost, &w);
    let mut initial_norm = None;
    for iter in 0..max_iter {
        let margins = x.dot(&w) * &y;
        let sig = margins.mapv(sigmoid);
        // d/dz of the loss term, per sample.
        let coeff = (&sig - 1.0) * &y * &cost;
        let grad = &w + &x.t().dot(&coeff);
        let grad_norm = grad.dot(&grad).sqrt();
        let reference = *initial_norm.get_or_insert(grad_norm);
        if grad_norm <= tol * reference.max(1.0) {
            log::debug!("logistic: converged after {iter} iterations");
            return Ok(w);
        }
        let curvature = &sig * &(1.0 - &sig) * &cost;
        let weighted = x * &curvature.insert_axis(Axis(1));
        let mut hessian = x.t().dot(&weighted);
        hessian.diag_mut().mapv_inplace(|v| v + 1.0);

        let h = DMatrix::from_fn(n_features, n_features, |i, j| hessian[[i, j]]);
        let g = DVector::from_iterator(n_features, grad.iter().map(|v| -v));
        let chol = Cholesky::new(h).ok_or_else(|| {
            PipelineError::NumericInstability("logistic Hessian is not positive definite".into())
        })?;
        let step: Array1<f64> = chol.solve(&g).iter().copied().collect();

        // Backtracking line search (Armijo).
        let slope = grad.dot(&step);
        let mut alpha = 1.0;
        loop {
            let candidate = &w + &(&step * alpha);
            let f_new = objective(x, y, cost, &candidate);
            let stalled = f_new - f <= f64::EPSILON * f.abs();
            if f_new <= f + 0.01 * alpha * slope || stalled || alpha < 1e-10 {
                w = candidate;
                f = f_new;
                break;
            }
            alpha *= 0.5;
        }
    }
    log::warn!("logistic: Newton solver did not converge in {max_iter} iterations");
    Ok(w)
}
