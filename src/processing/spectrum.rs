use super::median;

use rustfft::{num_complex::Complex, FftPlanner};

/// Sampling rate from the median timestamp spacing. `None` when the spacing
/// is not a positive finite number (too few samples, stalled clock).
pub fn sample_rate(timestamps: &[f64]) -> Option<f64> {
    if timestamps.len() < 2 {
        return None;
    }
    let spacing: Vec<f64> = timestamps.windows(2).map(|w| w[1] - w[0]).collect();
    let rate = 1.0 / median(&spacing);
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

/// Fundamental frequency of a pass and the spectral peak that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrequencyEstimate {
    pub frequency: f64,
    /// Peak |X_k|/N; the confidence proxy.
    pub peak_magnitude: f64,
}

impl FrequencyEstimate {
    pub fn degenerate(peak_magnitude: f64) -> Self {
        Self {
            frequency: 0.0,
            peak_magnitude,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.frequency == 0.0
    }
}

pub struct SpectralEstimator {
    planner: FftPlanner<f64>,
    threshold: f64,
}

impl SpectralEstimator {
    pub fn new(threshold: f64) -> Self {
        Self {
            planner: FftPlanner::new(),
            threshold,
        }
    }

    /// |X_k|/N for the bins below N/2 - 1. Nyquist and the bin just under it
    /// are left out.
    pub fn magnitudes(&mut self, signal: &[f64]) -> Vec<f64> {
        let n = signal.len();
        if n < 4 {
            return Vec::new();
        }

        let fft = self.planner.plan_fft_forward(n);
        let mut buffer: Vec<Complex<f64>> = signal.iter().map(|&x| Complex::new(x, 0.0)).collect();
        fft.process(&mut buffer);

        let scale = 1.0 / n as f64;
        buffer[..n / 2 - 1].iter().map(|c| c.norm() * scale).collect()
    }

    /// Strongest non-DC bin refined against its larger neighbour by a
    /// magnitude-weighted average of the two bin frequencies. No threshold
    /// is applied here.
    pub fn estimate(&mut self, signal: &[f64], sample_rate: f64) -> FrequencyEstimate {
        let magnitudes = self.magnitudes(signal);
        let Some(peak) = (1..magnitudes.len())
            .max_by(|&a, &b| magnitudes[a].total_cmp(&magnitudes[b]))
        else {
            return FrequencyEstimate::default();
        };

        let neighbour = match magnitudes.get(peak + 1) {
            Some(&above) if above > magnitudes[peak - 1] => peak + 1,
            _ => peak - 1,
        };

        let bin_frequency = |k: usize| sample_rate * k as f64 / signal.len() as f64;
        let weight = magnitudes[peak] + magnitudes[neighbour];
        if weight == 0.0 {
            return FrequencyEstimate::default();
        }

        FrequencyEstimate {
            frequency: (magnitudes[peak] * bin_frequency(peak)
                + magnitudes[neighbour] * bin_frequency(neighbour))
                / weight,
            peak_magnitude: magnitudes[peak],
        }
    }

    /// Median of the per-signal estimates. The first signal gates the
    /// result: if its peak is under the threshold the pass is degenerate and
    /// the others are not examined.
    pub fn fundamental(&mut self, signals: &[&[f64]], sample_rate: f64) -> FrequencyEstimate {
        let Some((first, rest)) = signals.split_first() else {
            return FrequencyEstimate::default();
        };

        let gate = self.estimate(first, sample_rate);
        if gate.peak_magnitude < self.threshold || gate.is_degenerate() {
            return FrequencyEstimate::degenerate(gate.peak_magnitude);
        }

        let mut frequencies = vec![gate.frequency];
        frequencies.extend(rest.iter().map(|s| self.estimate(s, sample_rate).frequency));
        log::trace!("per-signal frequency estimates {:?}", frequencies);

        FrequencyEstimate {
            frequency: median(&frequencies),
            peak_magnitude: gate.peak_magnitude,
        }
    }
}
