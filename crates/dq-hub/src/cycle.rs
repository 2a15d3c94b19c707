//! The acquisition/control cycle.
//!
//! One cooperative task per running cycle, suspended only at the pacing
//! sleep: all other steps of a tick run to completion against a single
//! consistent configuration snapshot. Cancellation (via the stop channel)
//! interrupts the sleep; the release path — close the hardware port, close
//! the session log — runs on every exit, stop or error alike.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dq_core::{HardwarePort, HubMessage, TickFrame};
use dq_controls::{Engine, IoLayout};
use dq_signal::Conditioner;
use dq_session::SessionWriter;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::hub::SubscriberHub;
use crate::runtime::{HubRuntime, OutputCommand};

/// Log/broadcast strides and debug dump depth for one cycle run.
#[derive(Debug, Clone, Copy)]
pub struct CycleOptions {
    /// Persist every Nth tick, N >= 1.
    pub log_every: u64,
    /// Broadcast every Mth tick, M >= 1. Independent of `log_every`.
    pub broadcast_every: u64,
    /// Fully dump the first N ticks at debug level.
    pub dump_first: u64,
}

impl Default for CycleOptions {
    fn default() -> Self {
        Self {
            log_every: 1,
            broadcast_every: 1,
            dump_first: 5,
        }
    }
}

pub(crate) struct CycleContext {
    pub runtime: Arc<HubRuntime>,
    pub subscribers: Arc<SubscriberHub>,
    pub port: Box<dyn HardwarePort>,
    pub writer: SessionWriter,
    pub session_id: String,
    pub conditioner: Conditioner,
    pub engine: Engine,
    pub layout: IoLayout,
    pub commands: mpsc::UnboundedReceiver<OutputCommand>,
    pub stop: watch::Receiver<bool>,
    pub options: CycleOptions,
}

pub(crate) struct CycleOutcome {
    pub ticks: u64,
}

/// Run the cycle until stopped or until the subscriber set empties.
///
/// Returns the (closed) port so the service can reuse it for the next run.
pub(crate) async fn run(mut cx: CycleContext) -> (Box<dyn HardwarePort>, CycleOutcome) {
    let announce: Arc<str> = match (HubMessage::Session {
        dir: cx.session_id.clone(),
    })
    .to_wire()
    {
        Ok(wire) => Arc::from(wire.as_str()),
        Err(e) => {
            // Session ids are plain strings; this cannot fail in practice.
            warn!(error = %e, "session announcement failed to serialize");
            Arc::from("{}")
        }
    };
    cx.subscribers.publish(&announce);
    info!(session = %cx.session_id, rate_hz = cx.runtime.rate_hz(), "acquisition cycle started");

    let mut ticks: u64 = 0;
    let mut last = Instant::now();

    loop {
        // Pacing from the current rate; responds to rate changes at the
        // next boundary. Drift-corrected against the previous wake, not a
        // fixed origin, so a stall never causes a catch-up burst.
        let dt = 1.0 / cx.runtime.rate_hz().max(1.0);
        let deadline = last + Duration::from_secs_f64(dt);
        tokio::select! {
            _ = cx.stop.changed() => break,
            _ = tokio::time::sleep_until(deadline) => {}
        }
        last = Instant::now();

        // Boundary-only reconfiguration: rebuild filters for the new
        // rate/cutoffs, reload the loop set (resetting loop state).
        let params = cx.runtime.tick_params();
        if let Some(channels) = params.reconfig {
            cx.conditioner.configure(params.rate_hz, &channels);
            info!(rate_hz = params.rate_hz, "reconfigured filters");
        }
        if let Some(loops) = params.loops_reload {
            let (engine, rejected) = Engine::load(&loops, &cx.layout);
            cx.engine = engine;
            info!(
                active = cx.engine.active_count(),
                rejected = rejected.len(),
                "reloaded loop set"
            );
        }

        while let Ok(cmd) = cx.commands.try_recv() {
            apply_command(cx.port.as_mut(), cmd);
        }

        // A single read failure is non-fatal: substitute a zero-filled
        // analog vector and an empty TC vector for this tick only.
        let (ai_raw, tc) = match read_inputs(cx.port.as_mut()) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "read failed; substituting defaults for this tick");
                (vec![0.0; cx.conditioner.channel_count()], Vec::new())
            }
        };

        let ai = cx.conditioner.step(&ai_raw);
        let pid = cx.engine.step(dt, &ai, &tc, cx.port.as_mut());

        let frame = TickFrame {
            t: unix_now(),
            ai,
            ao: cx.port.ao_snapshot(),
            dout: cx.port.do_snapshot(),
            tc,
            pid,
        };

        ticks += 1;

        if ticks <= cx.options.dump_first {
            debug!(tick = ticks, frame = ?frame, "tick");
        }

        if ticks % cx.options.log_every == 0
            && let Err(e) = cx.writer.write(&frame)
        {
            warn!(error = %e, "session write failed");
        }

        if ticks % cx.options.broadcast_every == 0 {
            match HubMessage::Tick(frame).to_wire() {
                Ok(wire) => {
                    let remaining = cx.subscribers.publish(&Arc::from(wire.as_str()));
                    if remaining == 0 {
                        info!("all subscribers gone; stopping cycle");
                        break;
                    }
                }
                Err(e) => warn!(error = %e, "frame failed to serialize"),
            }
        }
    }

    // Release path: runs for stop requests and subscriber loss alike.
    if let Err(e) = cx.port.close() {
        warn!(error = %e, "port close failed");
    }
    if let Err(e) = cx.writer.close() {
        warn!(error = %e, "session close failed");
    }
    info!(session = %cx.session_id, ticks, "acquisition cycle stopped");

    (cx.port, CycleOutcome { ticks })
}

fn read_inputs(
    port: &mut dyn HardwarePort,
) -> Result<(Vec<f64>, Vec<Option<f64>>), dq_core::PortError> {
    let ai = port.read_ai_all()?;
    let tc = port.read_tc_all()?;
    Ok((ai, tc))
}

fn apply_command(port: &mut dyn HardwarePort, cmd: OutputCommand) {
    let result = match cmd {
        OutputCommand::SetDo {
            index,
            on,
            active_high,
        } => port.set_do(index, on, active_high),
        OutputCommand::SetAo { index, volts } => port.set_ao(index, volts),
        OutputCommand::StartBuzz {
            index,
            hz,
            active_high,
        } => port.start_buzz(index, hz, active_high),
        OutputCommand::StopBuzz { index } => port.stop_buzz(index),
    };
    if let Err(e) = result {
        warn!(error = %e, "output command failed");
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
