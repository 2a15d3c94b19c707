//! Subscriber-driven cycle lifecycle.

use std::sync::Arc;

use dq_config::AppConfig;
use dq_controls::{Engine, IoLayout};
use dq_core::{AoChannel, HardwarePort, PortConfig};
use dq_session::{SessionColumns, SessionStore};
use dq_signal::Conditioner;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cycle::{self, CycleContext, CycleOptions, CycleOutcome};
use crate::hub::{SubscriberHub, SubscriberId, Subscription};
use crate::runtime::HubRuntime;
use crate::{HubError, HubResult};

struct RunningCycle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<(Box<dyn HardwarePort>, CycleOutcome)>,
}

struct Lifecycle {
    /// The device, held here while no cycle runs. A running cycle owns it
    /// exclusively and hands it back when it exits.
    idle_port: Option<Box<dyn HardwarePort>>,
    running: Option<RunningCycle>,
}

/// Gates the acquisition cycle on subscriber membership: the first
/// subscriber in starts it, the last one out stops it.
///
/// There is exactly one cycle at a time. A failed start (device open or
/// session open) is surfaced to the joining caller and the subscriber is
/// not registered.
pub struct HubService {
    runtime: Arc<HubRuntime>,
    subscribers: Arc<SubscriberHub>,
    sessions: SessionStore,
    options: CycleOptions,
    lifecycle: Mutex<Lifecycle>,
}

impl HubService {
    pub fn new(
        runtime: Arc<HubRuntime>,
        port: Box<dyn HardwarePort>,
        sessions: SessionStore,
        options: CycleOptions,
    ) -> Self {
        let options = CycleOptions {
            log_every: options.log_every.max(1),
            broadcast_every: options.broadcast_every.max(1),
            dump_first: options.dump_first,
        };
        Self {
            runtime,
            subscribers: Arc::new(SubscriberHub::new()),
            sessions,
            options,
            lifecycle: Mutex::new(Lifecycle {
                idle_port: Some(port),
                running: None,
            }),
        }
    }

    pub fn runtime(&self) -> &Arc<HubRuntime> {
        &self.runtime
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub async fn is_running(&self) -> bool {
        let lifecycle = self.lifecycle.lock().await;
        matches!(&lifecycle.running, Some(rc) if !rc.task.is_finished())
    }

    /// Register a subscriber, starting the cycle if none is running.
    pub async fn join(&self) -> HubResult<Subscription> {
        let mut lifecycle = self.lifecycle.lock().await;
        self.reap_finished(&mut lifecycle).await;

        let subscription = self.subscribers.join();
        if lifecycle.running.is_none() {
            if let Err(e) = self.start_cycle(&mut lifecycle).await {
                self.subscribers.leave(subscription.id);
                return Err(e);
            }
        }
        Ok(subscription)
    }

    /// Deregister a subscriber, stopping the cycle when the set empties.
    pub async fn leave(&self, id: SubscriberId) {
        let mut lifecycle = self.lifecycle.lock().await;
        let remaining = self.subscribers.leave(id);
        if remaining == 0 {
            self.stop_cycle(&mut lifecycle).await;
        }
    }

    async fn start_cycle(&self, lifecycle: &mut Lifecycle) -> HubResult<()> {
        let Some(mut port) = lifecycle.idle_port.take() else {
            return Err(HubError::NotRunning);
        };

        let config = self.runtime.config();
        let rate_hz = self.runtime.rate_hz();

        if let Err(e) = port.open(&port_config_from(&config)) {
            lifecycle.idle_port = Some(port);
            return Err(e.into());
        }

        let layout = layout_from(&config);
        let conditioner = Conditioner::new(rate_hz, &config.channel_configs());
        let (engine, rejected) = Engine::load(&self.runtime.loops(), &layout);
        if !rejected.is_empty() {
            warn!(rejected = rejected.len(), "loops dropped at cycle start");
        }

        // CSV columns are fixed for the session from this configuration
        // epoch; frames that fall short (failure ticks, reloaded loop sets)
        // are padded to it by the writer.
        let columns = SessionColumns {
            ai: layout.ai_channels,
            tc: layout.tc_channels,
            dout: layout.do_channels,
            ao: layout.ao_channels,
            loop_names: engine.loop_names(),
        };
        let (manifest, writer) = match self.sessions.open_session(rate_hz, columns) {
            Ok(v) => v,
            Err(e) => {
                if let Err(close_err) = port.close() {
                    warn!(error = %close_err, "port close failed after session failure");
                }
                lifecycle.idle_port = Some(port);
                return Err(e.into());
            }
        };

        let commands = self.runtime.attach_commands();
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(cycle::run(CycleContext {
            runtime: self.runtime.clone(),
            subscribers: self.subscribers.clone(),
            port,
            writer,
            session_id: manifest.session_id,
            conditioner,
            engine,
            layout,
            commands,
            stop: stop_rx,
            options: self.options,
        }));

        lifecycle.running = Some(RunningCycle { stop_tx, task });
        Ok(())
    }

    async fn stop_cycle(&self, lifecycle: &mut Lifecycle) {
        let Some(running) = lifecycle.running.take() else {
            return;
        };
        let _ = running.stop_tx.send(true);
        match running.task.await {
            Ok((port, outcome)) => {
                info!(ticks = outcome.ticks, "cycle reclaimed");
                lifecycle.idle_port = Some(port);
            }
            Err(e) => {
                // Task panicked; the device box is lost with it.
                warn!(error = %e, "cycle task failed to join");
            }
        }
        self.runtime.detach_commands();
    }

    /// A cycle that exited on its own (all subscribers pruned) still holds
    /// the port until reaped.
    async fn reap_finished(&self, lifecycle: &mut Lifecycle) {
        if matches!(&lifecycle.running, Some(rc) if rc.task.is_finished()) {
            self.stop_cycle(lifecycle).await;
        }
    }
}

fn port_config_from(config: &AppConfig) -> PortConfig {
    PortConfig {
        ai_channels: config.analogs.len(),
        do_channels: config.digital_outputs.len(),
        ao_channels: config
            .analog_outputs
            .iter()
            .map(|ao| AoChannel {
                min_v: ao.min_v,
                max_v: ao.max_v,
                startup_v: ao.startup_v,
            })
            .collect(),
        tc_channels: config.included_tc_count(),
    }
}

fn layout_from(config: &AppConfig) -> IoLayout {
    IoLayout {
        ai_channels: config.analogs.len(),
        tc_channels: config.included_tc_count(),
        do_channels: config.digital_outputs.len(),
        ao_channels: config.analog_outputs.len(),
    }
}
