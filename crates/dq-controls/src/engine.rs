//! Feedback engine: runs every loaded loop once per tick.

use dq_core::{HardwarePort, LoopTelemetry};
use tracing::warn;

use crate::error::ControlError;
use crate::loop_config::{LoopConfig, OutputKind, SourceKind};

/// Channel counts the engine validates loop wiring against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IoLayout {
    pub ai_channels: usize,
    pub tc_channels: usize,
    pub do_channels: usize,
    pub ao_channels: usize,
}

/// A loop definition dropped at load time, with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopRejection {
    pub name: String,
    pub reason: ControlError,
}

/// Mutable per-loop state, exclusively owned by the engine.
///
/// Persists across ticks; discarded whenever the loop set is replaced
/// wholesale, so state never carries over between unrelated loop
/// identities.
#[derive(Debug, Clone, Default)]
struct LoopState {
    integral: f64,
    prev_error: Option<f64>,
    last_output: f64,
}

struct ActiveLoop {
    config: LoopConfig,
    state: LoopState,
}

/// Runs the configured PID loops in load order, every tick.
#[derive(Default)]
pub struct Engine {
    loops: Vec<ActiveLoop>,
}

impl Engine {
    /// Load a loop set, dropping invalid or disabled definitions.
    ///
    /// Validation happens here, never at tick time. All loop state is reset,
    /// including for loops whose definitions are unchanged.
    pub fn load(configs: &[LoopConfig], layout: &IoLayout) -> (Self, Vec<LoopRejection>) {
        let mut loops = Vec::new();
        let mut rejected = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for config in configs {
            if !config.enabled {
                continue;
            }
            match validate_loop(config, layout) {
                Ok(()) => {
                    if !seen.insert(config.name.clone()) {
                        let reason = ControlError::DuplicateName {
                            name: config.name.clone(),
                        };
                        warn!(loop_name = %config.name, %reason, "dropping loop");
                        rejected.push(LoopRejection {
                            name: config.name.clone(),
                            reason,
                        });
                        continue;
                    }
                    loops.push(ActiveLoop {
                        config: config.clone(),
                        state: LoopState::default(),
                    });
                }
                Err(reason) => {
                    warn!(loop_name = %config.name, %reason, "dropping loop");
                    rejected.push(LoopRejection {
                        name: config.name.clone(),
                        reason,
                    });
                }
            }
        }

        (Self { loops }, rejected)
    }

    /// Number of loops that will run each tick.
    pub fn active_count(&self) -> usize {
        self.loops.len()
    }

    /// Names of the loaded loops, in run order.
    pub fn loop_names(&self) -> Vec<String> {
        self.loops.iter().map(|l| l.config.name.clone()).collect()
    }

    /// Run every loop once against this tick's sensed vectors.
    ///
    /// `dt` is the tick interval in seconds. Actuator writes go through
    /// `port`; a write failure is logged and absorbed, never propagated. A
    /// loop whose sensed value is unavailable this tick holds its previous
    /// output and does not integrate.
    pub fn step(
        &mut self,
        dt: f64,
        ai: &[f64],
        tc: &[Option<f64>],
        port: &mut dyn HardwarePort,
    ) -> Vec<LoopTelemetry> {
        let mut telemetry = Vec::with_capacity(self.loops.len());

        for l in &mut self.loops {
            let sensed = match l.config.src {
                SourceKind::Ai => ai.get(l.config.ai_ch).copied(),
                SourceKind::Tc => tc.get(l.config.ai_ch).copied().flatten(),
                SourceKind::Calc => None,
            };

            let Some(sensed) = sensed else {
                // Sensor unavailable this tick: hold output, freeze state.
                telemetry.push(LoopTelemetry {
                    name: l.config.name.clone(),
                    error: 0.0,
                    output: l.state.last_output,
                    integral: l.state.integral,
                });
                continue;
            };

            let c = &l.config;
            let error = (c.target - sensed).clamp(c.err_min, c.err_max);

            let integral = (l.state.integral + error * dt).clamp(c.i_min, c.i_max);

            let derivative = match l.state.prev_error {
                Some(prev) if dt > 0.0 => (error - prev) / dt,
                _ => 0.0,
            };

            let output =
                (c.kp * error + c.ki * integral + c.kd * derivative).clamp(c.out_min, c.out_max);

            let write = match c.kind {
                OutputKind::Analog => port.set_ao(c.out_ch, output),
                OutputKind::Digital => {
                    let on = output > 0.5 * (c.out_min + c.out_max);
                    port.set_do(c.out_ch, on, true)
                }
                // Rejected at load time.
                OutputKind::Tc | OutputKind::Calc => Ok(()),
            };
            if let Err(e) = write {
                warn!(loop_name = %c.name, error = %e, "actuator write failed");
            }

            l.state.integral = integral;
            l.state.prev_error = Some(error);
            l.state.last_output = output;

            telemetry.push(LoopTelemetry {
                name: c.name.clone(),
                error,
                output,
                integral,
            });
        }

        telemetry
    }
}

fn validate_loop(config: &LoopConfig, layout: &IoLayout) -> Result<(), ControlError> {
    match config.src {
        SourceKind::Ai => {
            if config.ai_ch >= layout.ai_channels {
                return Err(ControlError::UnresolvableChannel {
                    what: format!(
                        "loop '{}' reads AI{} but device has {} AI channels",
                        config.name, config.ai_ch, layout.ai_channels
                    ),
                });
            }
        }
        SourceKind::Tc => {
            if config.ai_ch >= layout.tc_channels {
                return Err(ControlError::UnresolvableChannel {
                    what: format!(
                        "loop '{}' reads TC{} but device has {} TC channels",
                        config.name, config.ai_ch, layout.tc_channels
                    ),
                });
            }
        }
        SourceKind::Calc => {
            return Err(ControlError::Unsupported {
                what: format!("loop '{}' uses a calc source", config.name),
            });
        }
    }

    match config.kind {
        OutputKind::Analog => {
            if config.out_ch >= layout.ao_channels {
                return Err(ControlError::UnresolvableChannel {
                    what: format!(
                        "loop '{}' drives AO{} but device has {} AO channels",
                        config.name, config.out_ch, layout.ao_channels
                    ),
                });
            }
        }
        OutputKind::Digital => {
            if config.out_ch >= layout.do_channels {
                return Err(ControlError::UnresolvableChannel {
                    what: format!(
                        "loop '{}' drives DO{} but device has {} DO channels",
                        config.name, config.out_ch, layout.do_channels
                    ),
                });
            }
        }
        OutputKind::Tc | OutputKind::Calc => {
            return Err(ControlError::Unsupported {
                what: format!("loop '{}' has a non-actuator output kind", config.name),
            });
        }
    }

    if config.out_min >= config.out_max {
        return Err(ControlError::InvalidArg {
            what: "out_min must be less than out_max",
        });
    }
    if config.i_min > config.i_max {
        return Err(ControlError::InvalidArg {
            what: "i_min must not exceed i_max",
        });
    }
    if config.err_min > config.err_max {
        return Err(ControlError::InvalidArg {
            what: "err_min must not exceed err_max",
        });
    }

    Ok(())
}
