//! Channel bank: scaling plus filtering for every analog input.

use serde::{Deserialize, Serialize};

use crate::lpf::OnePoleLpf;
use crate::scale;

/// Per-channel calibration and filter settings.
///
/// Owned by the process-wide configuration; immutable within a tick and
/// replaced wholesale between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Calibration slope (`y = slope * x + offset`).
    pub slope: f64,
    /// Calibration offset.
    pub offset: f64,
    /// Low-pass cutoff in Hz; `<= 0` disables filtering for the channel.
    pub cutoff_hz: f64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            slope: 1.0,
            offset: 0.0,
            cutoff_hz: 0.0,
        }
    }
}

/// Scales and filters one raw sample vector per tick.
///
/// Filter state always matches the rate/cutoffs it was configured with:
/// [`Conditioner::configure`] rebuilds every stage, so history computed
/// under a stale timebase is never applied to new samples.
#[derive(Debug, Clone, Default)]
pub struct Conditioner {
    channels: Vec<ChannelConfig>,
    stages: Vec<OnePoleLpf>,
}

impl Conditioner {
    /// Build a conditioner for the given rate and channel set.
    pub fn new(rate_hz: f64, channels: &[ChannelConfig]) -> Self {
        let mut c = Self::default();
        c.configure(rate_hz, channels);
        c
    }

    /// Rebuild all filter stages for a new rate and/or channel set.
    ///
    /// Idempotent. Accumulated filter history is discarded; each channel's
    /// next sample primes its stage, so a rate change never replays state
    /// from a different timebase.
    pub fn configure(&mut self, rate_hz: f64, channels: &[ChannelConfig]) {
        self.channels = channels.to_vec();
        self.stages = channels
            .iter()
            .map(|ch| OnePoleLpf::new(ch.cutoff_hz, rate_hz))
            .collect();
    }

    /// Number of configured channels; also the output length of [`step`].
    ///
    /// [`step`]: Conditioner::step
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Scale and filter one raw sample vector.
    ///
    /// The output always has exactly `channel_count()` entries: extra raw
    /// values are truncated, missing ones are read as `0.0` raw.
    pub fn step(&mut self, raw: &[f64]) -> Vec<f64> {
        self.channels
            .iter()
            .zip(self.stages.iter_mut())
            .enumerate()
            .map(|(i, (ch, stage))| {
                let x = raw.get(i).copied().unwrap_or(0.0);
                stage.apply(scale(x, ch.slope, ch.offset))
            })
            .collect()
    }
}
