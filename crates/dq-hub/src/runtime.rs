//! Shared runtime context: configuration snapshots and mutation points.
//!
//! Everything the transport layer may change while the cycle runs lives
//! here, behind one mutex. Mutations replace immutable `Arc` snapshots and
//! raise pending flags; the cycle consults them only at tick boundaries, so
//! every tick sees one consistent configuration.

use std::sync::{Arc, Mutex};

use dq_config::AppConfig;
use dq_controls::LoopConfig;
use dq_signal::ChannelConfig;
use tokio::sync::mpsc;
use tracing::info;

use crate::{HubError, HubResult};

/// Externally issued output command, queued into the running cycle.
///
/// The cycle is the hardware port's only owner, so commands reach the
/// device at the next tick boundary rather than immediately.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputCommand {
    SetDo {
        index: usize,
        on: bool,
        active_high: bool,
    },
    SetAo {
        index: usize,
        volts: f64,
    },
    StartBuzz {
        index: usize,
        hz: f64,
        active_high: bool,
    },
    StopBuzz {
        index: usize,
    },
}

struct Shared {
    config: Arc<AppConfig>,
    loops: Arc<Vec<LoopConfig>>,
    rate_hz: f64,
    reconfig_pending: bool,
    loops_pending: bool,
    cmd_tx: Option<mpsc::UnboundedSender<OutputCommand>>,
}

/// Snapshot the cycle takes at each tick boundary.
pub(crate) struct TickParams {
    pub rate_hz: f64,
    /// Channel set to rebuild the conditioner with, when a reconfiguration
    /// was pending. Taking the snapshot clears the flag.
    pub reconfig: Option<Vec<ChannelConfig>>,
    /// Loop set to reload the engine with, when a replacement was pending.
    pub loops_reload: Option<Arc<Vec<LoopConfig>>>,
}

/// Owned context for one hub process; no ambient globals.
pub struct HubRuntime {
    shared: Mutex<Shared>,
}

impl HubRuntime {
    pub fn new(config: AppConfig, loops: Vec<LoopConfig>) -> Self {
        let rate_hz = config.sample_rate_hz().max(1.0);
        Self {
            shared: Mutex::new(Shared {
                config: Arc::new(config),
                loops: Arc::new(loops),
                rate_hz,
                reconfig_pending: false,
                loops_pending: false,
                cmd_tx: None,
            }),
        }
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<AppConfig> {
        self.shared.lock().expect("runtime lock").config.clone()
    }

    /// Current loop set snapshot.
    pub fn loops(&self) -> Arc<Vec<LoopConfig>> {
        self.shared.lock().expect("runtime lock").loops.clone()
    }

    /// Current sample rate in Hz.
    pub fn rate_hz(&self) -> f64 {
        self.shared.lock().expect("runtime lock").rate_hz
    }

    /// Set the sample rate, clamped to >= 1 Hz. Takes effect at the next
    /// tick boundary; filters are rebuilt for the new timebase.
    pub fn set_rate(&self, hz: f64) -> f64 {
        let mut shared = self.shared.lock().expect("runtime lock");
        shared.rate_hz = hz.max(1.0);
        shared.reconfig_pending = true;
        info!(rate_hz = shared.rate_hz, "sample rate set");
        shared.rate_hz
    }

    /// Replace the device/channel configuration wholesale.
    pub fn replace_config(&self, config: AppConfig) {
        let mut shared = self.shared.lock().expect("runtime lock");
        shared.config = Arc::new(config);
        shared.reconfig_pending = true;
        info!("configuration replaced");
    }

    /// Replace the loop set wholesale. All loop state resets when the cycle
    /// picks this up at the next tick boundary.
    pub fn replace_loops(&self, loops: Vec<LoopConfig>) {
        let mut shared = self.shared.lock().expect("runtime lock");
        shared.loops = Arc::new(loops);
        shared.loops_pending = true;
        info!("loop set replaced");
    }

    /// Queue an output command for the running cycle.
    pub fn command(&self, cmd: OutputCommand) -> HubResult<()> {
        let shared = self.shared.lock().expect("runtime lock");
        match &shared.cmd_tx {
            Some(tx) if tx.send(cmd).is_ok() => Ok(()),
            _ => Err(HubError::NotRunning),
        }
    }

    /// True while a cycle is draining commands.
    pub fn is_running(&self) -> bool {
        self.shared.lock().expect("runtime lock").cmd_tx.is_some()
    }

    pub(crate) fn attach_commands(&self) -> mpsc::UnboundedReceiver<OutputCommand> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.lock().expect("runtime lock").cmd_tx = Some(tx);
        rx
    }

    pub(crate) fn detach_commands(&self) {
        self.shared.lock().expect("runtime lock").cmd_tx = None;
    }

    /// Tick-boundary snapshot: current rate plus any pending rebuild work.
    /// Clears the pending flags it reports.
    pub(crate) fn tick_params(&self) -> TickParams {
        let mut shared = self.shared.lock().expect("runtime lock");
        let reconfig = if shared.reconfig_pending {
            shared.reconfig_pending = false;
            Some(shared.config.channel_configs())
        } else {
            None
        };
        let loops_reload = if shared.loops_pending {
            shared.loops_pending = false;
            Some(shared.loops.clone())
        } else {
            None
        };
        TickParams {
            rate_hz: shared.rate_hz,
            reconfig,
            loops_reload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dq_config::default_config;

    fn runtime() -> HubRuntime {
        HubRuntime::new(default_config(), Vec::new())
    }

    #[test]
    fn rate_clamps_to_one_hz() {
        let rt = runtime();
        assert_eq!(rt.set_rate(0.2), 1.0);
        assert_eq!(rt.set_rate(200.0), 200.0);
        assert_eq!(rt.rate_hz(), 200.0);
    }

    #[test]
    fn rate_change_raises_reconfig_once() {
        let rt = runtime();
        rt.set_rate(25.0);
        let params = rt.tick_params();
        assert_eq!(params.rate_hz, 25.0);
        assert!(params.reconfig.is_some());
        // Flag cleared by the snapshot.
        assert!(rt.tick_params().reconfig.is_none());
    }

    #[test]
    fn loop_replacement_is_reported_once() {
        let rt = runtime();
        rt.replace_loops(vec![LoopConfig::default()]);
        assert!(rt.tick_params().loops_reload.is_some());
        assert!(rt.tick_params().loops_reload.is_none());
    }

    #[test]
    fn commands_require_a_running_cycle() {
        let rt = runtime();
        let cmd = OutputCommand::SetAo {
            index: 0,
            volts: 2.5,
        };
        assert!(matches!(
            rt.command(cmd.clone()),
            Err(HubError::NotRunning)
        ));

        let mut rx = rt.attach_commands();
        assert!(rt.is_running());
        rt.command(cmd.clone()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), cmd);

        rt.detach_commands();
        assert!(matches!(rt.command(cmd), Err(HubError::NotRunning)));
    }
}
