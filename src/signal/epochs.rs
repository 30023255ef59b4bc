//! Raw-to-epoch segmentation.
//!
//! Continuous (channels x samples) data is cut around every event onset, the
//! epochs are put in event-matrix order, detrended, baseline corrected,
//! narrowed to the analysis window and decimated.
use ndarray::{s, Array2, Array3, ArrayViewMut1, Axis};

use crate::config::{EpochConfig, TimeWindow};
use crate::error::{PipelineError, Result};
use crate::types::RecordingType;

/// Full segmentation chain producing (n_epochs, n_channels, n_times).
pub fn raw2epoch(
    config: &EpochConfig,
    raw: &Array2<f64>,
    timestamps: &[usize],
    events: &Array2<i64>,
) -> Result<Array3<f64>> {
    match config.recording_type.parse::<RecordingType>()? {
        RecordingType::Eeg => {}
    }
    if config.samplerate <= 0.0 {
        return Err(PipelineError::InvalidSampleRate);
    }
    if !config.cut.contains(&config.analysis) {
        return Err(PipelineError::InvalidWindow(format!(
            "analysis window {:?} is not inside cut window {:?}",
            config.analysis, config.cut
        )));
    }
    let down_ratio = config.down_ratio()?;
    let n_times = config.analysis.samples(config.samplerate);
    if down_ratio > n_times.max(1) {
        return Err(PipelineError::InvalidWindow(format!(
            "decimation stride {down_ratio} exceeds the {n_times} samples of window {:?}",
            config.analysis
        )));
    }

    let epochs = cut_epochs(&config.cut, config.samplerate, raw, timestamps)?;
    let mut epochs = sort_epochs(epochs, events)?;
    detrend(&mut epochs);
    apply_baseline(config, &mut epochs)?;
    let epochs = time_window(&config.cut, &config.analysis, config.samplerate, &epochs)?;
    let epochs = epochs.slice(s![.., .., ..;down_ratio]).to_owned();
    log::debug!(
        "cut {} epochs -> shape {:?} (decimation {})",
        timestamps.len(),
        epochs.shape(),
        down_ratio
    );
    Ok(epochs)
}

/// One window of `cut` per timestamp (sample index of the onset).
pub fn cut_epochs(
    cut: &TimeWindow,
    sample_rate_hz: f64,
    raw: &Array2<f64>,
    timestamps: &[usize],
) -> Result<Array3<f64>> {
    let (n_channels, n_samples) = raw.dim();
    let offset = TimeWindow::offset_samples(cut.start, sample_rate_hz);
    let len = cut.samples(sample_rate_hz);
    let mut epochs = Array3::zeros((timestamps.len(), n_channels, len));
    for (index, &timestamp) in timestamps.iter().enumerate() {
        let begin = timestamp as isize + offset;
        if begin < 0 || begin as usize + len > n_samples {
            return Err(PipelineError::EpochOutOfBounds {
                index,
                timestamp,
                n_samples,
            });
        }
        let begin = begin as usize;
        epochs
            .slice_mut(s![index, .., ..])
            .assign(&raw.slice(s![.., begin..begin + len]));
    }
    Ok(epochs)
}

/// Index permutation putting arrival-ordered epochs into event-matrix order.
///
/// Epochs arrive trial by trial; inside a trial they are ranked by a stable
/// ascending sort of that trial's event codes.
pub fn event_order(events: &Array2<i64>) -> Vec<usize> {
    let reps = events.ncols();
    let mut order = Vec::with_capacity(events.len());
    for (trial, row) in events.outer_iter().enumerate() {
        let mut ranks: Vec<usize> = (0..reps).collect();
        ranks.sort_by_key(|&k| row[k]);
        order.extend(ranks.into_iter().map(|k| trial * reps + k));
    }
    order
}

pub fn sort_epochs(epochs: Array3<f64>, events: &Array2<i64>) -> Result<Array3<f64>> {
    let n_epochs = epochs.len_of(Axis(0));
    if events.len() != n_epochs {
        return Err(PipelineError::EventMismatch {
            events: events.len(),
            epochs: n_epochs,
        });
    }
    Ok(epochs.select(Axis(0), &event_order(events)))
}

/// Removes the least-squares line from every epoch and channel.
pub fn detrend(epochs: &mut Array3<f64>) {
    for lane in epochs.lanes_mut(Axis(2)) {
        detrend_lane(lane);
    }
}

fn detrend_lane(mut lane: ArrayViewMut1<f64>) {
    let n = lane.len();
    if n == 0 {
        return;
    }
    let t_mean = (n - 1) as f64 / 2.0;
    let x_mean = lane.sum() / n as f64;
    let (mut sxx, mut sxy) = (0.0, 0.0);
    for (t, &x) in lane.iter().enumerate() {
        let dt = t as f64 - t_mean;
        sxx += dt * dt;
        sxy += dt * (x - x_mean);
    }
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    for (t, x) in lane.iter_mut().enumerate() {
        *x -= x_mean + slope * (t as f64 - t_mean);
    }
}

/// Subtracts the per-epoch, per-channel mean of the baseline window.
pub fn apply_baseline(config: &EpochConfig, epochs: &mut Array3<f64>) -> Result<()> {
    let Some(window) = config.baseline_window() else {
        log::warn!("cut window {:?} has no pre-onset samples; baseline skipped", config.cut);
        return Ok(());
    };
    if !config.cut.contains(&window) {
        return Err(PipelineError::InvalidWindow(format!(
            "baseline window {:?} is not inside cut window {:?}",
            window, config.cut
        )));
    }
    let range = config.cut.sub_range(&window, config.samplerate);
    if range.is_empty() {
        log::warn!("baseline window {window:?} spans no samples; baseline skipped");
        return Ok(());
    }
    let baseline = epochs
        .slice(s![.., .., range])
        .mean_axis(Axis(2))
        .ok_or_else(|| PipelineError::shape("non-empty baseline", epochs.shape()))?
        .insert_axis(Axis(2));
    *epochs -= &baseline;
    Ok(())
}

/// Narrows epochs cut with `cut` to `window`.
pub fn time_window(
    cut: &TimeWindow,
    window: &TimeWindow,
    sample_rate_hz: f64,
    epochs: &Array3<f64>,
) -> Result<Array3<f64>> {
    if !cut.contains(window) {
        return Err(PipelineError::InvalidWindow(format!(
            "window {window:?} is not inside cut window {cut:?}"
        )));
    }
    let range = cut.sub_range(window, sample_rate_hz);
    Ok(epochs.slice(s![.., .., range]).to_owned())
}
