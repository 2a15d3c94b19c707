//! dq-signal: per-channel signal conditioning.
//!
//! Converts raw sensor volts into calibrated, denoised channel values:
//! an affine scale (`y = slope * x + offset`) followed by a one-pole
//! low-pass filter parameterized by a cutoff frequency and the current
//! sample rate.

pub mod conditioner;
pub mod lpf;

pub use conditioner::{ChannelConfig, Conditioner};
pub use lpf::OnePoleLpf;

/// Affine calibration transform, applied per channel before filtering.
pub fn scale(raw: f64, slope: f64, offset: f64) -> f64 {
    slope * raw + offset
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_is_affine() {
        assert_eq!(scale(2.0, 3.0, 1.0), 7.0);
        assert_eq!(scale(0.0, 3.0, 1.0), 1.0);
        assert_eq!(scale(-1.0, 1.0, 0.0), -1.0);
    }
}
