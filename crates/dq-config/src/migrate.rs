//! Legacy document migrations, applied on load before validation.

use serde_json::Value;
use tracing::info;

use crate::schema::{AppConfig, DoMode};

/// Legacy `script.json` was a top-level event array; wrap it into the
/// current `{ "events": [...] }` shape.
pub fn migrate_script_value(value: Value) -> Value {
    match value {
        Value::Array(events) => {
            info!("migrating legacy script document (list -> events object)");
            let mut obj = serde_json::Map::new();
            obj.insert("events".to_string(), Value::Array(events));
            Value::Object(obj)
        }
        other => other,
    }
}

/// Digital outputs once carried a `momentary: bool` instead of `mode`;
/// derive the mode when it is absent.
pub fn migrate_config(config: &mut AppConfig) {
    for d in &mut config.digital_outputs {
        if d.mode.is_none() {
            let mode = if d.momentary.unwrap_or(false) {
                DoMode::Momentary
            } else {
                DoMode::Toggle
            };
            d.mode = Some(mode);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ScriptFile;

    #[test]
    fn legacy_script_list_is_wrapped() {
        let legacy: Value = serde_json::from_str(r#"[{"at": 1.0}]"#).unwrap();
        let migrated = migrate_script_value(legacy);
        let script: ScriptFile = serde_json::from_value(migrated).unwrap();
        assert_eq!(script.events.len(), 1);
    }

    #[test]
    fn current_script_shape_is_untouched() {
        let current: Value = serde_json::from_str(r#"{"events": []}"#).unwrap();
        assert_eq!(migrate_script_value(current.clone()), current);
    }

    #[test]
    fn momentary_flag_becomes_mode() {
        let mut cfg = crate::schema::default_config();
        cfg.digital_outputs[0].mode = None;
        cfg.digital_outputs[0].momentary = Some(true);
        cfg.digital_outputs[1].mode = None;
        migrate_config(&mut cfg);
        assert_eq!(cfg.digital_outputs[0].mode, Some(DoMode::Momentary));
        assert_eq!(cfg.digital_outputs[1].mode, Some(DoMode::Toggle));
    }
}
