//! File-backed configuration store.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::migrate::{migrate_config, migrate_script_value};
use crate::schema::{AppConfig, PidFile, ScriptFile, default_config};
use crate::validate::{validate_config, validate_pid_file};
use crate::{ConfigError, ConfigResult};

const CONFIG_FILE: &str = "config.json";
const PID_FILE: &str = "pid.json";
const SCRIPT_FILE: &str = "script.json";

/// Loads and saves the three stored documents in one directory.
///
/// Missing files are bootstrapped with built-in defaults the first time the
/// store is created. A file that exists but fails to parse or validate is an
/// error for the caller; it is never silently replaced.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn open(dir: impl Into<PathBuf>) -> ConfigResult<Self> {
        let store = Self { dir: dir.into() };
        fs::create_dir_all(&store.dir)?;
        store.bootstrap()?;
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    fn bootstrap(&self) -> ConfigResult<()> {
        if !self.path(CONFIG_FILE).exists() {
            info!("bootstrapping default {CONFIG_FILE}");
            self.save_config(&default_config())?;
        }
        if !self.path(PID_FILE).exists() {
            info!("bootstrapping empty {PID_FILE}");
            self.save_pid(&PidFile::default())?;
        }
        if !self.path(SCRIPT_FILE).exists() {
            info!("bootstrapping empty {SCRIPT_FILE}");
            self.save_script(&ScriptFile::default())?;
        }
        Ok(())
    }

    pub fn load_config(&self) -> ConfigResult<AppConfig> {
        let text = fs::read_to_string(self.path(CONFIG_FILE))?;
        let mut config: AppConfig =
            serde_json::from_str(&text).map_err(|source| ConfigError::Json {
                file: CONFIG_FILE.to_string(),
                source,
            })?;
        migrate_config(&mut config);
        validate_config(&config)?;
        Ok(config)
    }

    pub fn save_config(&self, config: &AppConfig) -> ConfigResult<()> {
        validate_config(config)?;
        let text = serde_json::to_string_pretty(config).map_err(|source| ConfigError::Json {
            file: CONFIG_FILE.to_string(),
            source,
        })?;
        fs::write(self.path(CONFIG_FILE), text)?;
        Ok(())
    }

    pub fn load_pid(&self) -> ConfigResult<PidFile> {
        let text = fs::read_to_string(self.path(PID_FILE))?;
        let pid: PidFile = serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            file: PID_FILE.to_string(),
            source,
        })?;
        validate_pid_file(&pid)?;
        Ok(pid)
    }

    pub fn save_pid(&self, pid: &PidFile) -> ConfigResult<()> {
        validate_pid_file(pid)?;
        let text = serde_json::to_string_pretty(pid).map_err(|source| ConfigError::Json {
            file: PID_FILE.to_string(),
            source,
        })?;
        fs::write(self.path(PID_FILE), text)?;
        Ok(())
    }

    pub fn load_script(&self) -> ConfigResult<ScriptFile> {
        let text = fs::read_to_string(self.path(SCRIPT_FILE))?;
        let value: serde_json::Value =
            serde_json::from_str(&text).map_err(|source| ConfigError::Json {
                file: SCRIPT_FILE.to_string(),
                source,
            })?;
        let migrated = migrate_script_value(value);
        let script: ScriptFile =
            serde_json::from_value(migrated).map_err(|source| ConfigError::Json {
                file: SCRIPT_FILE.to_string(),
                source,
            })?;
        Ok(script)
    }

    pub fn save_script(&self, script: &ScriptFile) -> ConfigResult<()> {
        let text = serde_json::to_string_pretty(script).map_err(|source| ConfigError::Json {
            file: SCRIPT_FILE.to_string(),
            source,
        })?;
        fs::write(self.path(SCRIPT_FILE), text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "dq-config-{tag}-{}-{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn bootstrap_writes_defaults_once() {
        let dir = temp_dir("bootstrap");
        let store = ConfigStore::open(&dir).unwrap();
        assert_eq!(store.load_config().unwrap(), default_config());
        assert!(store.load_pid().unwrap().loops.is_empty());
        assert!(store.load_script().unwrap().events.is_empty());

        // A later open must not clobber an edited document.
        let mut cfg = store.load_config().unwrap();
        cfg.board1608.sample_rate_hz = 25.0;
        store.save_config(&cfg).unwrap();
        let store = ConfigStore::open(&dir).unwrap();
        assert_eq!(store.load_config().unwrap().sample_rate_hz(), 25.0);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_config_is_an_error_not_a_default() {
        let dir = temp_dir("corrupt");
        let store = ConfigStore::open(&dir).unwrap();
        fs::write(dir.join("config.json"), "{not json").unwrap();
        assert!(store.load_config().is_err());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn legacy_script_migrates_on_load() {
        let dir = temp_dir("legacy-script");
        let store = ConfigStore::open(&dir).unwrap();
        fs::write(dir.join("script.json"), r#"[{"at": 2.5}]"#).unwrap();
        let script = store.load_script().unwrap();
        assert_eq!(script.events.len(), 1);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn invalid_pid_document_rejected_on_save() {
        let dir = temp_dir("pid-dup");
        let store = ConfigStore::open(&dir).unwrap();
        let mut pid = PidFile::default();
        let l = dq_controls::LoopConfig {
            enabled: true,
            name: "dup".to_string(),
            ..dq_controls::LoopConfig::default()
        };
        pid.loops.push(l.clone());
        pid.loops.push(l);
        assert!(store.save_pid(&pid).is_err());
        let _ = fs::remove_dir_all(&dir);
    }
}
