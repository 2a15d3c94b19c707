//! Simulated hardware port.
//!
//! Deterministic synthetic signals so the hub can run and be exercised
//! without a physical device: each analog channel carries a slow sine wave,
//! thermocouple channels idle near room temperature, and commanded outputs
//! are held exactly as written.

use std::collections::HashMap;
use std::f64::consts::TAU;
use std::time::Instant;

use dq_core::{HardwarePort, PortConfig, PortError, PortResult};

struct Buzz {
    hz: f64,
    started: Instant,
}

struct OpenState {
    config: PortConfig,
    dout: Vec<bool>,
    aout: Vec<f64>,
    buzz: HashMap<usize, Buzz>,
    opened_at: Instant,
}

/// In-process device standing in for the acquisition hardware.
#[derive(Default)]
pub struct SimPort {
    state: Option<OpenState>,
}

impl SimPort {
    pub fn new() -> Self {
        Self::default()
    }

    fn open_state(&mut self) -> PortResult<&mut OpenState> {
        self.state.as_mut().ok_or(PortError::NotOpen)
    }

    fn elapsed(state: &OpenState) -> f64 {
        state.opened_at.elapsed().as_secs_f64()
    }
}

impl HardwarePort for SimPort {
    fn open(&mut self, config: &PortConfig) -> PortResult<()> {
        if self.state.is_some() {
            return Err(PortError::AlreadyOpen);
        }
        self.state = Some(OpenState {
            dout: vec![false; config.do_channels],
            aout: config.ao_channels.iter().map(|ch| ch.startup_v).collect(),
            buzz: HashMap::new(),
            opened_at: Instant::now(),
            config: config.clone(),
        });
        Ok(())
    }

    fn close(&mut self) -> PortResult<()> {
        self.state = None;
        Ok(())
    }

    fn read_ai_all(&mut self) -> PortResult<Vec<f64>> {
        let state = self.open_state()?;
        let t = Self::elapsed(state);
        Ok((0..state.config.ai_channels)
            .map(|i| {
                let freq = 0.05 * (i + 1) as f64;
                0.1 * i as f64 + (TAU * freq * t).sin()
            })
            .collect())
    }

    fn read_tc_all(&mut self) -> PortResult<Vec<Option<f64>>> {
        let state = self.open_state()?;
        let t = Self::elapsed(state);
        Ok((0..state.config.tc_channels)
            .map(|i| Some(22.0 + i as f64 + 0.5 * (TAU * 0.02 * t).sin()))
            .collect())
    }

    fn set_do(&mut self, index: usize, on: bool, _active_high: bool) -> PortResult<()> {
        let state = self.open_state()?;
        let count = state.dout.len();
        let slot = state
            .dout
            .get_mut(index)
            .ok_or(PortError::ChannelOob {
                kind: "DO",
                index,
                count,
            })?;
        *slot = on;
        state.buzz.remove(&index);
        Ok(())
    }

    fn set_ao(&mut self, index: usize, volts: f64) -> PortResult<()> {
        let state = self.open_state()?;
        let count = state.aout.len();
        let ch = state
            .config
            .ao_channels
            .get(index)
            .ok_or(PortError::ChannelOob {
                kind: "AO",
                index,
                count,
            })?;
        state.aout[index] = volts.clamp(ch.min_v, ch.max_v);
        Ok(())
    }

    // Snapshots report logical state, so active_high only matters for a
    // physical line; the sim has none.
    fn start_buzz(&mut self, index: usize, hz: f64, _active_high: bool) -> PortResult<()> {
        let state = self.open_state()?;
        if index >= state.dout.len() {
            return Err(PortError::ChannelOob {
                kind: "DO",
                index,
                count: state.dout.len(),
            });
        }
        if !(hz > 0.0) {
            return Err(PortError::Device("buzz rate must be positive".to_string()));
        }
        state.buzz.insert(
            index,
            Buzz {
                hz,
                started: Instant::now(),
            },
        );
        Ok(())
    }

    fn stop_buzz(&mut self, index: usize) -> PortResult<()> {
        let state = self.open_state()?;
        if state.buzz.remove(&index).is_some() {
            state.dout[index] = false;
        }
        Ok(())
    }

    fn do_snapshot(&self) -> Vec<bool> {
        match &self.state {
            Some(state) => state
                .dout
                .iter()
                .enumerate()
                .map(|(i, &held)| match state.buzz.get(&i) {
                    // Square wave phased from the buzz start.
                    Some(b) => {
                        let phase = b.started.elapsed().as_secs_f64() * b.hz * 2.0;
                        (phase as u64) % 2 == 0
                    }
                    None => held,
                })
                .collect(),
            None => Vec::new(),
        }
    }

    fn ao_snapshot(&self) -> Vec<f64> {
        match &self.state {
            Some(state) => state.aout.clone(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dq_core::AoChannel;

    fn config() -> PortConfig {
        PortConfig {
            ai_channels: 4,
            do_channels: 4,
            ao_channels: vec![
                AoChannel {
                    min_v: 0.0,
                    max_v: 10.0,
                    startup_v: 1.5,
                },
                AoChannel::default(),
            ],
            tc_channels: 2,
        }
    }

    #[test]
    fn open_applies_startup_volts() {
        let mut port = SimPort::new();
        port.open(&config()).unwrap();
        assert_eq!(port.ao_snapshot(), vec![1.5, 0.0]);
        assert_eq!(port.do_snapshot(), vec![false; 4]);
    }

    #[test]
    fn reads_fail_when_closed() {
        let mut port = SimPort::new();
        assert!(port.read_ai_all().is_err());
        port.open(&config()).unwrap();
        assert_eq!(port.read_ai_all().unwrap().len(), 4);
        assert_eq!(port.read_tc_all().unwrap().len(), 2);
        port.close().unwrap();
        assert!(port.read_ai_all().is_err());
    }

    #[test]
    fn double_open_rejected_close_is_idempotent() {
        let mut port = SimPort::new();
        port.open(&config()).unwrap();
        assert!(port.open(&config()).is_err());
        port.close().unwrap();
        port.close().unwrap();
    }

    #[test]
    fn ao_writes_clamp_to_range() {
        let mut port = SimPort::new();
        port.open(&config()).unwrap();
        port.set_ao(0, 99.0).unwrap();
        assert_eq!(port.ao_snapshot()[0], 10.0);
        port.set_ao(0, -5.0).unwrap();
        assert_eq!(port.ao_snapshot()[0], 0.0);
        assert!(port.set_ao(7, 1.0).is_err());
    }

    #[test]
    fn do_writes_and_oob() {
        let mut port = SimPort::new();
        port.open(&config()).unwrap();
        port.set_do(2, true, true).unwrap();
        assert!(port.do_snapshot()[2]);
        assert!(port.set_do(9, true, true).is_err());
    }

    #[test]
    fn buzz_overrides_snapshot_until_stopped() {
        let mut port = SimPort::new();
        port.open(&config()).unwrap();
        port.start_buzz(1, 5.0, true).unwrap();
        // Phase 0: asserted.
        assert!(port.do_snapshot()[1]);
        port.stop_buzz(1).unwrap();
        assert!(!port.do_snapshot()[1]);
        assert!(port.start_buzz(1, 0.0, true).is_err());
    }
}
