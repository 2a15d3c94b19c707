//! Tick frames and the wire message envelope.
//!
//! A [`TickFrame`] is the immutable output of one acquisition cycle
//! iteration. It is assembled once per tick and then shared read-only by the
//! session recorder and the subscriber hub; nothing mutates it afterwards.

use serde::{Deserialize, Serialize};

/// Per-loop telemetry recorded into each frame by the feedback engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopTelemetry {
    /// Loop name (unique within the loaded loop set).
    pub name: String,
    /// Control error after clamping, `setpoint - sensed`.
    pub error: f64,
    /// Clamped actuator command written this tick.
    pub output: f64,
    /// Integral accumulator after this tick's update.
    pub integral: f64,
}

/// One acquisition cycle iteration: timestamp, conditioned inputs, and
/// output snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickFrame {
    /// Wall-clock timestamp, seconds since the Unix epoch.
    pub t: f64,
    /// Scaled + filtered analog input values, one per configured channel.
    pub ai: Vec<f64>,
    /// Commanded analog output volts, as reported by the hardware port.
    pub ao: Vec<f64>,
    /// Commanded digital output states, as reported by the hardware port.
    #[serde(rename = "do")]
    pub dout: Vec<bool>,
    /// Thermocouple readings; `None` marks an open/unavailable channel.
    /// Empty when the device has no TC channels or this tick's read failed.
    pub tc: Vec<Option<f64>>,
    /// Feedback engine telemetry, one entry per active loop in load order.
    pub pid: Vec<LoopTelemetry>,
}

/// Messages sent to live subscribers, pre-serialized once per broadcast.
///
/// The `session` announcement is sent exactly once when a cycle starts; every
/// subsequent message for that cycle is a `tick`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HubMessage {
    Session {
        /// Session directory name, e.g. `20250830_141503`.
        dir: String,
    },
    Tick(TickFrame),
}

impl HubMessage {
    /// Serialize to the compact wire form shared with all subscribers.
    pub fn to_wire(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
