//! Document-level validation.
//!
//! Corrupt or inconsistent documents are returned to the caller as errors;
//! built-in defaults are written only on first-run bootstrap, never to mask
//! later corruption. Per-loop wiring against the live channel layout is
//! validated separately by the feedback engine at load time.

use std::collections::HashSet;

use crate::schema::{AppConfig, PidFile};

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Duplicate loop name: {name}")]
    DuplicateLoopName { name: String },
}

pub fn validate_config(config: &AppConfig) -> Result<(), ValidationError> {
    if !(config.board1608.sample_rate_hz > 0.0) {
        return Err(ValidationError::InvalidValue {
            field: "board1608.sampleRateHz".to_string(),
            value: config.board1608.sample_rate_hz.to_string(),
            reason: "sample rate must be positive".to_string(),
        });
    }

    for (i, a) in config.analogs.iter().enumerate() {
        if !a.slope.is_finite() || !a.offset.is_finite() {
            return Err(ValidationError::InvalidValue {
                field: format!("analogs[{i}]"),
                value: format!("slope={}, offset={}", a.slope, a.offset),
                reason: "calibration must be finite".to_string(),
            });
        }
        if !a.cutoff_hz.is_finite() || a.cutoff_hz < 0.0 {
            return Err(ValidationError::InvalidValue {
                field: format!("analogs[{i}].cutoffHz"),
                value: a.cutoff_hz.to_string(),
                reason: "cutoff must be zero or a positive frequency".to_string(),
            });
        }
    }

    for (i, ao) in config.analog_outputs.iter().enumerate() {
        if ao.min_v >= ao.max_v {
            return Err(ValidationError::InvalidValue {
                field: format!("analogOutputs[{i}]"),
                value: format!("minV={}, maxV={}", ao.min_v, ao.max_v),
                reason: "minV must be less than maxV".to_string(),
            });
        }
        if ao.startup_v < ao.min_v || ao.startup_v > ao.max_v {
            return Err(ValidationError::InvalidValue {
                field: format!("analogOutputs[{i}].startupV"),
                value: ao.startup_v.to_string(),
                reason: "startup volts must lie within the output range".to_string(),
            });
        }
    }

    Ok(())
}

/// Document-level loop checks. Duplicate names are an error here because a
/// wholesale PUT of the loop document is the caller's mistake to fix;
/// per-channel wiring problems are dropped loop-by-loop at engine load
/// instead.
pub fn validate_pid_file(pid: &PidFile) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for l in pid.loops.iter().filter(|l| l.enabled) {
        if !seen.insert(&l.name) {
            return Err(ValidationError::DuplicateLoopName {
                name: l.name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::default_config;
    use dq_controls::LoopConfig;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&default_config()).is_ok());
    }

    #[test]
    fn zero_rate_rejected() {
        let mut cfg = default_config();
        cfg.board1608.sample_rate_hz = 0.0;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn non_finite_slope_rejected() {
        let mut cfg = default_config();
        cfg.analogs[3].slope = f64::NAN;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn inverted_ao_range_rejected() {
        let mut cfg = default_config();
        cfg.analog_outputs[0].min_v = 5.0;
        cfg.analog_outputs[0].max_v = 5.0;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn startup_outside_range_rejected() {
        let mut cfg = default_config();
        cfg.analog_outputs[1].startup_v = 12.0;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn duplicate_enabled_loop_names_rejected() {
        let mut pid = PidFile::default();
        let mut a = LoopConfig {
            enabled: true,
            name: "x".to_string(),
            ..LoopConfig::default()
        };
        pid.loops.push(a.clone());
        a.kp = 2.0;
        pid.loops.push(a);
        assert!(validate_pid_file(&pid).is_err());
    }

    #[test]
    fn duplicate_disabled_loop_names_allowed() {
        let mut pid = PidFile::default();
        let a = LoopConfig {
            enabled: false,
            name: "x".to_string(),
            ..LoopConfig::default()
        };
        pid.loops.push(a.clone());
        pid.loops.push(a);
        assert!(validate_pid_file(&pid).is_ok());
    }
}
