pub mod lowpass;

/// A causal filter fed one sample at a time.
pub trait FilterInstance: Send + Sync {
    fn process_sample(&mut self, input: f64) -> f64;

    /// Loads the filter history as if `value` had been applied forever.
    fn settle(&mut self, value: f64);
}

/// Samples of odd extension added at each end before forward-backward filtering.
pub const FILTFILT_PAD: usize = 15;

/// Zero-phase filtering: runs `filter` forwards then backwards over the signal
/// padded with its odd extension, starting each direction from steady state.
pub fn filtfilt<F: FilterInstance + Clone>(filter: &F, signal: &[f64]) -> Vec<f64> {
    let n = signal.len();
    if n == 0 {
        return Vec::new();
    }
    let pad = FILTFILT_PAD.min(n - 1);

    let first = signal[0];
    let last = signal[n - 1];
    let mut extended = Vec::with_capacity(n + 2 * pad);
    extended.extend((1..=pad).rev().map(|i| 2.0 * first - signal[i]));
    extended.extend_from_slice(signal);
    extended.extend((1..=pad).map(|i| 2.0 * last - signal[n - 1 - i]));

    let mut forward = filter.clone();
    forward.settle(extended[0]);
    let mut pass: Vec<f64> = extended.iter().map(|&x| forward.process_sample(x)).collect();

    let mut backward = filter.clone();
    backward.settle(pass[pass.len() - 1]);
    for sample in pass.iter_mut().rev() {
        *sample = backward.process_sample(*sample);
    }

    pass[pad..pad + n].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Identity filter for checking the padding bookkeeping alone.
    #[derive(Clone)]
    struct Passthrough;

    impl FilterInstance for Passthrough {
        fn process_sample(&mut self, input: f64) -> f64 {
            input
        }

        fn settle(&mut self, _value: f64) {}
    }

    #[test]
    fn passthrough_returns_the_signal() {
        let signal: Vec<f64> = (0..40).map(|i| (i as f64 * 0.3).sin()).collect();
        assert_eq!(filtfilt(&Passthrough, &signal), signal);
    }

    #[test]
    fn short_signals_shrink_the_pad() {
        assert_eq!(filtfilt(&Passthrough, &[2.0]), vec![2.0]);
        assert_eq!(filtfilt(&Passthrough, &[1.0, 2.0, 3.0]), vec![1.0, 2.0, 3.0]);
        assert!(filtfilt(&Passthrough, &[]).is_empty());
    }
}
