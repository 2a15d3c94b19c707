//! Stored document schemas.

use dq_controls::LoopConfig;
use dq_signal::ChannelConfig;
use serde::{Deserialize, Serialize};

/// Top-level device/channel configuration (`config.json`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Analog-input board setup.
    pub board1608: BoardDef,
    /// Thermocouple board setup.
    pub boardetc: BoardDef,
    #[serde(default)]
    pub analogs: Vec<AnalogDef>,
    #[serde(default, rename = "digitalOutputs")]
    pub digital_outputs: Vec<DigitalOutDef>,
    #[serde(default, rename = "analogOutputs")]
    pub analog_outputs: Vec<AnalogOutDef>,
    #[serde(default)]
    pub thermocouples: Vec<TcDef>,
}

impl AppConfig {
    /// Acquisition sample rate; the cycle clamps this to >= 1 Hz.
    pub fn sample_rate_hz(&self) -> f64 {
        self.board1608.sample_rate_hz
    }

    /// Per-channel conditioning settings in channel order.
    pub fn channel_configs(&self) -> Vec<ChannelConfig> {
        self.analogs
            .iter()
            .map(|a| ChannelConfig {
                slope: a.slope,
                offset: a.offset,
                cutoff_hz: a.cutoff_hz,
            })
            .collect()
    }

    /// Thermocouple channels marked for acquisition.
    pub fn included_tc_count(&self) -> usize {
        self.thermocouples.iter().filter(|t| t.include).count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoardDef {
    #[serde(rename = "boardNum")]
    pub board_num: u32,
    #[serde(rename = "sampleRateHz")]
    pub sample_rate_hz: f64,
    #[serde(rename = "blockSize", default = "default_block_size")]
    pub block_size: u32,
}

fn default_block_size() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalogDef {
    #[serde(default)]
    pub name: String,
    #[serde(default = "one")]
    pub slope: f64,
    #[serde(default)]
    pub offset: f64,
    #[serde(rename = "cutoffHz", default)]
    pub cutoff_hz: f64,
    #[serde(default)]
    pub units: String,
    #[serde(default = "yes")]
    pub include: bool,
}

fn one() -> f64 {
    1.0
}

fn yes() -> bool {
    true
}

/// Front-panel behavior of a digital output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DoMode {
    #[default]
    Toggle,
    Momentary,
    Buzz,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DigitalOutDef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mode: Option<DoMode>,
    /// Legacy flag superseded by `mode`; migrated on load.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub momentary: Option<bool>,
    #[serde(rename = "normallyOpen", default)]
    pub normally_open: bool,
    #[serde(rename = "actuationTime", default)]
    pub actuation_time: f64,
    #[serde(default = "yes")]
    pub include: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalogOutDef {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "minV", default)]
    pub min_v: f64,
    #[serde(rename = "maxV", default = "ten")]
    pub max_v: f64,
    #[serde(rename = "startupV", default)]
    pub startup_v: f64,
    #[serde(default = "yes")]
    pub include: bool,
}

fn ten() -> f64 {
    10.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TcDef {
    #[serde(default)]
    pub include: bool,
    #[serde(default)]
    pub ch: u32,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default = "default_tc_type")]
    pub tc_type: String,
    #[serde(default)]
    pub offset: f64,
}

fn default_tc_type() -> String {
    "K".to_string()
}

/// Feedback loop document (`pid.json`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PidFile {
    #[serde(default)]
    pub loops: Vec<LoopConfig>,
}

/// Declarative event script (`script.json`).
///
/// Stored and served verbatim; the execution engine is a separate subsystem
/// and events are held as opaque JSON values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ScriptFile {
    #[serde(default)]
    pub events: Vec<serde_json::Value>,
}

/// Built-in first-run configuration: 8 AI channels (unity scale, unfiltered),
/// 8 digital outputs, 2 analog outputs (0-10 V), 8 thermocouple slots off.
pub fn default_config() -> AppConfig {
    AppConfig {
        board1608: BoardDef {
            board_num: 0,
            sample_rate_hz: 10.0,
            block_size: 1,
        },
        boardetc: BoardDef {
            board_num: 1,
            sample_rate_hz: 10.0,
            block_size: 1,
        },
        analogs: (0..8)
            .map(|i| AnalogDef {
                name: format!("AI{i}"),
                slope: 1.0,
                offset: 0.0,
                cutoff_hz: 0.0,
                units: "V".to_string(),
                include: true,
            })
            .collect(),
        digital_outputs: (0..8)
            .map(|i| DigitalOutDef {
                name: format!("DO{i}"),
                mode: Some(DoMode::Toggle),
                momentary: None,
                normally_open: true,
                actuation_time: 0.0,
                include: true,
            })
            .collect(),
        analog_outputs: (0..2)
            .map(|i| AnalogOutDef {
                name: format!("AO{i}"),
                min_v: 0.0,
                max_v: 10.0,
                startup_v: 0.0,
                include: true,
            })
            .collect(),
        thermocouples: (0..8)
            .map(|i| TcDef {
                include: false,
                ch: i,
                name: format!("TC{i}"),
                tc_type: "K".to_string(),
                offset: 0.0,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_shape() {
        let cfg = default_config();
        assert_eq!(cfg.analogs.len(), 8);
        assert_eq!(cfg.analog_outputs.len(), 2);
        assert_eq!(cfg.included_tc_count(), 0);
        assert_eq!(cfg.sample_rate_hz(), 10.0);
    }

    #[test]
    fn config_serializes_with_stored_field_names() {
        let json = serde_json::to_string(&default_config()).unwrap();
        assert!(json.contains("\"sampleRateHz\""));
        assert!(json.contains("\"cutoffHz\""));
        assert!(json.contains("\"digitalOutputs\""));
        assert!(json.contains("\"normallyOpen\""));
        assert!(json.contains("\"startupV\""));
    }

    #[test]
    fn tc_type_round_trips_through_type_key() {
        let json = r#"{"include": true, "ch": 2, "name": "inlet", "type": "J", "offset": 0.5}"#;
        let tc: TcDef = serde_json::from_str(json).unwrap();
        assert_eq!(tc.tc_type, "J");
        assert!(serde_json::to_string(&tc).unwrap().contains("\"type\":\"J\""));
    }

    #[test]
    fn script_events_are_opaque() {
        let json = r#"{"events": [{"at": 5.0, "action": {"setDo": [0, true]}}]}"#;
        let script: ScriptFile = serde_json::from_str(json).unwrap();
        assert_eq!(script.events.len(), 1);
    }
}
