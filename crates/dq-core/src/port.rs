//! Hardware port contract.
//!
//! The acquisition cycle is the sole owner of one [`HardwarePort`] for the
//! port's entire open lifetime. Read failures are transient (the cycle
//! substitutes defaults for that tick); open/close failures are fatal to the
//! current cycle only.

use thiserror::Error;

pub type PortResult<T> = Result<T, PortError>;

#[derive(Error, Debug)]
pub enum PortError {
    #[error("Port is not open")]
    NotOpen,

    #[error("Port is already open")]
    AlreadyOpen,

    #[error("Channel out of range: {kind}{index} (count={count})")]
    ChannelOob {
        kind: &'static str,
        index: usize,
        count: usize,
    },

    #[error("Device error: {0}")]
    Device(String),
}

/// Channel layout and analog-output ranges a port is opened with.
///
/// Derived from the stored configuration by the hub; kept separate so port
/// implementations do not depend on the document schema.
#[derive(Debug, Clone, PartialEq)]
pub struct PortConfig {
    /// Number of analog input channels read each tick.
    pub ai_channels: usize,
    /// Number of digital output channels.
    pub do_channels: usize,
    /// Analog output channels with their voltage range and startup value.
    pub ao_channels: Vec<AoChannel>,
    /// Thermocouple channels present on the device; empty when none.
    pub tc_channels: usize,
}

/// One analog output channel's range and startup command.
#[derive(Debug, Clone, PartialEq)]
pub struct AoChannel {
    pub min_v: f64,
    pub max_v: f64,
    pub startup_v: f64,
}

impl Default for AoChannel {
    fn default() -> Self {
        Self {
            min_v: 0.0,
            max_v: 10.0,
            startup_v: 0.0,
        }
    }
}

/// The device contract the acquisition cycle drives.
///
/// Implementations are free to block briefly (register reads); anything
/// slower belongs behind an internal buffer. All output-state queries report
/// *commanded* state, not measured state.
pub trait HardwarePort: Send {
    /// Open the device with the given channel layout. Analog outputs must be
    /// driven to their startup volts before this returns.
    fn open(&mut self, config: &PortConfig) -> PortResult<()>;

    /// Release the device. Must be safe to call on an already-closed port.
    fn close(&mut self) -> PortResult<()>;

    /// Read all analog input channels. Length equals `ai_channels`.
    fn read_ai_all(&mut self) -> PortResult<Vec<f64>>;

    /// Read all thermocouple channels; `None` marks an open channel.
    /// Empty when the device has no TC hardware.
    fn read_tc_all(&mut self) -> PortResult<Vec<Option<f64>>>;

    /// Command a digital output. `active_high = false` inverts the physical
    /// line; the snapshot still reports the logical state.
    fn set_do(&mut self, index: usize, on: bool, active_high: bool) -> PortResult<()>;

    /// Command an analog output in volts, clamped to the channel's range.
    fn set_ao(&mut self, index: usize, volts: f64) -> PortResult<()>;

    /// Start toggling a digital output at `hz`. Replaces any buzz already
    /// running on that channel.
    fn start_buzz(&mut self, index: usize, hz: f64, active_high: bool) -> PortResult<()>;

    /// Stop a buzz pattern, leaving the output de-asserted.
    fn stop_buzz(&mut self, index: usize) -> PortResult<()>;

    /// Current commanded digital output states.
    fn do_snapshot(&self) -> Vec<bool>;

    /// Current commanded analog output volts.
    fn ao_snapshot(&self) -> Vec<f64>;
}
