use ndarray::{Array3, ArrayBase, Axis, Data, Ix3};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormMethod {
    /// One mean/std per channel, pooled over epochs and time.
    Channel,
    /// One mean/std per (channel, time) feature, pooled over epochs.
    Dim,
}

/// Standardizes epoch tensors shaped (n_epochs, n_channels, n_times).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChannelScaler {
    method: NormMethod,
    mean: Option<Array3<f64>>,
    std: Option<Array3<f64>>,
}

impl ChannelScaler {
    pub fn new(method: &str) -> Result<Self> {
        let method = match method.to_lowercase().as_str() {
            "channel" => NormMethod::Channel,
            "dim" => NormMethod::Dim,
            _ => return Err(PipelineError::UnsupportedNormalization(method.to_owned())),
        };
        Ok(Self {
            method,
            mean: None,
            std: None,
        })
    }

    pub fn method(&self) -> NormMethod {
        self.method
    }
    pub fn mean(&self) -> Option<&Array3<f64>> {
        self.mean.as_ref()
    }
    pub fn std(&self) -> Option<&Array3<f64>> {
        self.std.as_ref()
    }

    pub fn fit<S: Data<Elem = f64>>(&mut self, x: &ArrayBase<S, Ix3>) -> Result<&mut Self> {
        let empty = || PipelineError::shape("non-empty epochs", x.shape());
        let (mean, std) = match self.method {
            NormMethod::Channel => {
                let mean = x
                    .mean_axis(Axis(2))
                    .and_then(|m| m.mean_axis(Axis(0)))
                    .ok_or_else(empty)?
                    .insert_axis(Axis(0))
                    .insert_axis(Axis(2));
                let var = (x - &mean)
                    .mapv(|v| v * v)
                    .mean_axis(Axis(2))
                    .and_then(|m| m.mean_axis(Axis(0)))
                    .ok_or_else(empty)?
                    .insert_axis(Axis(0))
                    .insert_axis(Axis(2));
                (mean, var.mapv(f64::sqrt))
            }
            NormMethod::Dim => {
                let mean = x.mean_axis(Axis(0)).ok_or_else(empty)?.insert_axis(Axis(0));
                let std = x.std_axis(Axis(0), 0.0).insert_axis(Axis(0));
                (mean, std)
            }
        };
        self.mean = Some(mean);
        self.std = Some(std);
        Ok(self)
    }

    /// Returns a standardized copy; `x` is left untouched.
    pub fn transform<S: Data<Elem = f64>>(&self, x: &ArrayBase<S, Ix3>) -> Result<Array3<f64>> {
        let (Some(mean), Some(std)) = (&self.mean, &self.std) else {
            return Err(PipelineError::NotFitted("ChannelScaler"));
        };
        let (_, n_channels, n_times) = x.dim();
        let compatible = match self.method {
            NormMethod::Channel => mean.dim().1 == n_channels,
            NormMethod::Dim => mean.dim().1 == n_channels && mean.dim().2 == n_times,
        };
        if !compatible {
            return Err(PipelineError::shape(&mean.shape()[1..], &x.shape()[1..]));
        }
        let mut out = x.to_owned();
        out -= mean;
        out /= std;
        Ok(out)
    }

    pub fn fit_transform<S: Data<Elem = f64>>(&mut self, x: &ArrayBase<S, Ix3>) -> Result<Array3<f64>> {
        self.fit(x)?;
        self.transform(x)
    }
}
