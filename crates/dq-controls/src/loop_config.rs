//! Loop definition as stored in the persisted loop document.
//!
//! Field names match the on-disk JSON (`ai_ch`, `out_min`, ...). The schema
//! deliberately accepts source/output kinds the engine does not run
//! (`calc`), so one unsupported loop never fails parsing of the whole
//! document; such loops are rejected at load time with a diagnostic.

use serde::{Deserialize, Serialize};

/// Where a loop's sensed value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Scaled analog input channel.
    #[default]
    Ai,
    /// Thermocouple channel.
    Tc,
    /// Derived/computed channel. Accepted by the schema, not run.
    Calc,
}

/// What a loop's output drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Analog output channel (volts).
    #[default]
    Analog,
    /// Digital output channel (on/off, thresholded at the output midpoint).
    Digital,
    /// Legacy values accepted by the schema, not run.
    Tc,
    Calc,
}

/// A named, user-editable PID loop definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: OutputKind,
    #[serde(default)]
    pub src: SourceKind,
    /// Source channel index into the AI or TC vector.
    #[serde(default)]
    pub ai_ch: usize,
    /// Output channel index into the DO or AO bank.
    #[serde(default)]
    pub out_ch: usize,
    /// Setpoint in scaled engineering units.
    #[serde(default)]
    pub target: f64,
    #[serde(default)]
    pub kp: f64,
    #[serde(default)]
    pub ki: f64,
    #[serde(default)]
    pub kd: f64,
    #[serde(default)]
    pub out_min: f64,
    #[serde(default = "one")]
    pub out_max: f64,
    #[serde(default = "neg_one")]
    pub err_min: f64,
    #[serde(default = "one")]
    pub err_max: f64,
    /// Integral accumulator clamp; prevents windup.
    #[serde(default = "neg_one")]
    pub i_min: f64,
    #[serde(default = "one")]
    pub i_max: f64,
}

fn one() -> f64 {
    1.0
}

fn neg_one() -> f64 {
    -1.0
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            name: String::new(),
            kind: OutputKind::Analog,
            src: SourceKind::Ai,
            ai_ch: 0,
            out_ch: 0,
            target: 0.0,
            kp: 0.0,
            ki: 0.0,
            kd: 0.0,
            out_min: 0.0,
            out_max: 1.0,
            err_min: -1.0,
            err_max: 1.0,
            i_min: -1.0,
            i_max: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stored_document_shape() {
        let json = r#"{
            "enabled": true, "name": "heater", "kind": "digital", "src": "tc",
            "ai_ch": 2, "out_ch": 1, "target": 80.0,
            "kp": 1.5, "ki": 0.2, "kd": 0.0,
            "out_min": 0.0, "out_max": 1.0,
            "err_min": -50.0, "err_max": 50.0,
            "i_min": -10.0, "i_max": 10.0
        }"#;
        let cfg: LoopConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.kind, OutputKind::Digital);
        assert_eq!(cfg.src, SourceKind::Tc);
        assert_eq!(cfg.ai_ch, 2);
        assert_eq!(cfg.target, 80.0);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: LoopConfig = serde_json::from_str(r#"{"name": "x"}"#).unwrap();
        assert!(!cfg.enabled);
        assert_eq!(cfg.out_max, 1.0);
        assert_eq!(cfg.err_min, -1.0);
    }

    #[test]
    fn calc_kind_still_parses() {
        let cfg: LoopConfig =
            serde_json::from_str(r#"{"name": "derived", "src": "calc"}"#).unwrap();
        assert_eq!(cfg.src, SourceKind::Calc);
    }
}
