//! One-pole low-pass filter.

use std::f64::consts::TAU;

/// First-order exponential smoothing filter.
///
/// `y[n] = y[n-1] + alpha * (x[n] - y[n-1])` with
/// `alpha = 1 - exp(-2*pi*cutoff_hz / rate_hz)`, so `alpha -> 1` as the
/// cutoff grows (passthrough) and `alpha -> 0` as it shrinks.
///
/// A non-positive cutoff disables filtering entirely rather than freezing
/// the output at its first value.
#[derive(Debug, Clone, PartialEq)]
pub struct OnePoleLpf {
    alpha: f64,
    y: Option<f64>,
}

impl OnePoleLpf {
    /// Build a filter for the given cutoff at the given sample rate.
    ///
    /// The accumulator starts empty: the first sample passes through
    /// unchanged and primes the filter history.
    pub fn new(cutoff_hz: f64, rate_hz: f64) -> Self {
        Self {
            alpha: alpha_for(cutoff_hz, rate_hz),
            y: None,
        }
    }

    /// Smoothing coefficient in `[0, 1]`.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Apply one sample and return the filtered value.
    pub fn apply(&mut self, x: f64) -> f64 {
        let y = match self.y {
            Some(prev) => prev + self.alpha * (x - prev),
            // First sample after (re)configuration primes the history.
            None => x,
        };
        self.y = Some(y);
        y
    }

    /// Discard accumulated history. The next sample primes the filter again.
    pub fn reset(&mut self) {
        self.y = None;
    }
}

fn alpha_for(cutoff_hz: f64, rate_hz: f64) -> f64 {
    if cutoff_hz <= 0.0 || !cutoff_hz.is_finite() {
        // Filtering disabled.
        return 1.0;
    }
    let rate = rate_hz.max(1.0);
    1.0 - (-TAU * cutoff_hz / rate).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_cutoff_is_passthrough() {
        let mut lpf = OnePoleLpf::new(0.0, 100.0);
        assert_eq!(lpf.alpha(), 1.0);
        assert_eq!(lpf.apply(3.5), 3.5);
        assert_eq!(lpf.apply(-1.0), -1.0);
    }

    #[test]
    fn alpha_approaches_one_for_large_cutoff() {
        let lpf = OnePoleLpf::new(1.0e6, 100.0);
        assert!(lpf.alpha() > 0.999_999);
    }

    #[test]
    fn alpha_approaches_zero_for_small_cutoff() {
        let lpf = OnePoleLpf::new(1.0e-6, 100.0);
        assert!(lpf.alpha() < 1.0e-4);
        assert!(lpf.alpha() > 0.0);
    }

    #[test]
    fn first_sample_primes_history() {
        let mut lpf = OnePoleLpf::new(1.0, 100.0);
        assert_eq!(lpf.apply(10.0), 10.0);
        // Second sample moves toward the input by alpha.
        let y = lpf.apply(0.0);
        assert!((y - (10.0 - lpf.alpha() * 10.0)).abs() < 1e-12);
    }

    #[test]
    fn converges_to_constant_input() {
        let mut lpf = OnePoleLpf::new(5.0, 100.0);
        lpf.apply(0.0);
        let mut y = 0.0;
        for _ in 0..2000 {
            y = lpf.apply(1.0);
        }
        assert!((y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn reset_discards_history() {
        let mut lpf = OnePoleLpf::new(1.0, 100.0);
        lpf.apply(100.0);
        lpf.reset();
        assert_eq!(lpf.apply(-3.0), -3.0);
    }
}
