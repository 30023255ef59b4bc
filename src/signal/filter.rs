//! Zero-phase FIR band filter for ERP extraction.
//!
//! Pay attention: a passband starting close to 0 Hz yields a badly conditioned
//! design. Prefer a single-cutoff lowpass band when extracting slow potentials.
use std::f64::consts::PI;

use ndarray::{Array, Array2, ArrayView1, ArrayViewMut1, Axis, Dimension, Zip};

use crate::error::{PipelineError, Result};
use crate::signal::spectrum::FrequencyResponse;

/// Anything that turns a (channels x samples) block into features.
pub trait FeatureExtractor {
    fn extract(&self, data: &Array2<f64>) -> Result<Array2<f64>>;
}

impl<F> FeatureExtractor for F
where
    F: Fn(&Array2<f64>) -> Result<Array2<f64>>,
{
    fn extract(&self, data: &Array2<f64>) -> Result<Array2<f64>> {
        self(data)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKind {
    Lowpass,
    Bandpass,
}

#[derive(Clone, Debug)]
pub struct ErpFilter {
    sample_rate_hz: f64,
    band: Vec<f64>,
    kind: FilterKind,
    taps: Vec<f64>,
}

impl ErpFilter {
    /// `band` holds one cutoff (lowpass) or two band edges (bandpass), in Hz.
    /// The FIR order defaults to `sfreq / 5`.
    pub fn new(sample_rate_hz: f64, band: Option<&[f64]>, order: Option<usize>) -> Result<Self> {
        if sample_rate_hz <= 0.0 {
            return Err(PipelineError::InvalidSampleRate);
        }
        let band = band.ok_or(PipelineError::MissingBand)?;
        let invalid = || PipelineError::InvalidBand {
            band: band.to_vec(),
            sfreq: sample_rate_hz,
        };
        let nyquist = sample_rate_hz * 0.5;
        if band.iter().any(|&f| !(f > 0.0 && f < nyquist)) {
            return Err(invalid());
        }
        let kind = match band {
            [_] => FilterKind::Lowpass,
            [low, high] if low < high => FilterKind::Bandpass,
            _ => return Err(invalid()),
        };
        let order = order.unwrap_or((sample_rate_hz / 5.0) as usize);
        let taps = firwin(order + 1, band, nyquist, kind);
        let filter = Self {
            sample_rate_hz,
            band: band.to_vec(),
            kind,
            taps,
        };
        log::debug!(
            "{:?} FIR {:?} Hz, {} taps, DC gain {:.4}",
            filter.kind,
            filter.band,
            filter.taps.len(),
            filter.frequency_response(1024).gain_at(0.0)
        );
        Ok(filter)
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }
    pub fn band(&self) -> &[f64] {
        &self.band
    }
    pub fn taps(&self) -> &[f64] {
        &self.taps
    }
    pub fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }
    /// Number of samples mirrored on each side before filtering.
    pub fn pad_len(&self) -> usize {
        3 * self.taps.len()
    }

    pub fn frequency_response(&self, fft_size: usize) -> FrequencyResponse {
        FrequencyResponse::of_taps(&self.taps, self.sample_rate_hz, fft_size)
    }

    /// Forward-backward filtering along the last axis. Output has the input's shape.
    pub fn apply<D: Dimension>(&self, data: &Array<f64, D>) -> Result<Array<f64, D>> {
        let last = data
            .ndim()
            .checked_sub(1)
            .ok_or_else(|| PipelineError::shape("at least one axis", data.shape()))?;
        let axis = Axis(last);
        let len = data.len_of(axis);
        let pad = self.pad_len();
        if len <= pad {
            return Err(PipelineError::SignalTooShort { len, pad });
        }
        let mut out: Array<f64, D> = Array::zeros(data.raw_dim());
        Zip::from(out.lanes_mut(axis))
            .and(data.lanes(axis))
            .for_each(|output, input| filtfilt_lane(&self.taps, pad, input, output));
        Ok(out)
    }
}

impl FeatureExtractor for ErpFilter {
    fn extract(&self, data: &Array2<f64>) -> Result<Array2<f64>> {
        self.apply(data)
    }
}

fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

fn hamming(i: usize, n: usize) -> f64 {
    if n == 1 {
        return 1.0;
    }
    0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos()
}

/// Windowed-sinc design, scaled to unit gain at DC (lowpass) or the band centre.
fn firwin(numtaps: usize, cutoff: &[f64], nyquist: f64, kind: FilterKind) -> Vec<f64> {
    let (left, right) = match kind {
        FilterKind::Lowpass => (0.0, cutoff[0] / nyquist),
        FilterKind::Bandpass => (cutoff[0] / nyquist, cutoff[1] / nyquist),
    };
    let alpha = 0.5 * (numtaps - 1) as f64;
    let mut taps: Vec<f64> = (0..numtaps)
        .map(|i| {
            let m = i as f64 - alpha;
            (right * sinc(right * m) - left * sinc(left * m)) * hamming(i, numtaps)
        })
        .collect();
    let scale_freq = if left == 0.0 { 0.0 } else { 0.5 * (left + right) };
    let gain: f64 = taps
        .iter()
        .enumerate()
        .map(|(i, h)| h * (PI * (i as f64 - alpha) * scale_freq).cos())
        .sum();
    for h in &mut taps {
        *h /= gain;
    }
    taps
}

/// Transposed direct form II with a pure FIR denominator.
fn lfilter(taps: &[f64], input: &[f64], mut state: Vec<f64>) -> Vec<f64> {
    let order = taps.len() - 1;
    input
        .iter()
        .map(|&x| {
            if order == 0 {
                return taps[0] * x;
            }
            let y = taps[0] * x + state[0];
            for i in 0..order - 1 {
                state[i] = taps[i + 1] * x + state[i + 1];
            }
            state[order - 1] = taps[order] * x;
            y
        })
        .collect()
}

/// Initial state giving the step response's steady state.
fn steady_state(taps: &[f64], scale: f64) -> Vec<f64> {
    (1..taps.len())
        .map(|i| taps[i..].iter().sum::<f64>() * scale)
        .collect()
}

fn filtfilt_lane(taps: &[f64], pad: usize, input: ArrayView1<f64>, mut output: ArrayViewMut1<f64>) {
    let n = input.len();
    let first = input[0];
    let last = input[n - 1];
    // Odd extension on both ends.
    let mut ext = Vec::with_capacity(n + 2 * pad);
    ext.extend((1..=pad).rev().map(|i| 2.0 * first - input[i]));
    ext.extend(input.iter().copied());
    ext.extend((1..=pad).map(|i| 2.0 * last - input[n - 1 - i]));

    let forward = lfilter(taps, &ext, steady_state(taps, ext[0]));
    let reversed: Vec<f64> = forward.into_iter().rev().collect();
    let backward = lfilter(taps, &reversed, steady_state(taps, reversed[0]));
    for (o, v) in output
        .iter_mut()
        .zip(backward.iter().rev().skip(pad).take(n))
    {
        *o = *v;
    }
}
