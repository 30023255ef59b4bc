use rustfft::{num_complex::Complex64, FftPlanner};
/// Magnitude response of an FIR filter.
#[derive(Clone, Debug)]
pub struct FrequencyResponse {
    pub sample_rate_hz: f64,
    pub frequencies_hz: Vec<f64>,
    pub magnitudes: Vec<f64>,
}
impl FrequencyResponse {
    /// Zero-pads `taps` to `fft_size` (at least the tap count) and keeps the
    /// first half of the spectrum.
    pub fn of_taps(taps: &[f64], sample_rate_hz: f64, fft_size: usize) -> Self {
        let fft_size = fft_size.max(taps.len()).max(2);
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let bin_hz = sample_rate_hz / fft_size as f64;
        let frequencies_hz = (0..fft_size / 2).map(|k| k as f64 * bin_hz).collect();
        let mut buffer: Vec<Complex64> = taps.iter().map(|&h| Complex64::new(h, 0.0)).collect();
        buffer.resize(fft_size, Complex64::new(0.0, 0.0));
        fft.process(&mut buffer);
        let magnitudes = buffer.iter().take(fft_size / 2).map(|c| c.norm()).collect();
        Self {
            sample_rate_hz,
            frequencies_hz,
            magnitudes,
        }
    }
    /// Gain of the bin nearest to `freq_hz`.
    pub fn gain_at(&self, freq_hz: f64) -> f64 {
        if self.magnitudes.is_empty() {
            return 0.0;
        }
        let bin_hz = self.frequencies_hz.get(1).copied().unwrap_or(self.sample_rate_hz);
        let idx = (freq_hz / bin_hz).round().max(0.0) as usize;
        self.magnitudes[idx.min(self.magnitudes.len() - 1)]
    }
}
