//! Session storage root.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::types::{SessionColumns, SessionManifest};
use crate::writer::SessionWriter;
use crate::{SessionError, SessionResult};

const MANIFEST_FILE: &str = "manifest.json";
const CSV_FILE: &str = "session.csv";

/// Root directory holding one subdirectory per session.
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    pub fn new(root: impl Into<PathBuf>) -> SessionResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open a new session scope named after the current local time.
    ///
    /// `columns` fixes the CSV layout for the whole session; the header is
    /// written immediately. Returns the manifest (whose `session_id` is
    /// announced to subscribers) and the writer the cycle owns until it
    /// stops.
    pub fn open_session(
        &self,
        rate_hz: f64,
        columns: SessionColumns,
    ) -> SessionResult<(SessionManifest, SessionWriter)> {
        let now = Local::now();
        let session_id = now.format("%Y%m%d_%H%M%S").to_string();
        let dir = self.root.join(&session_id);
        fs::create_dir_all(&dir)?;

        let manifest = SessionManifest {
            session_id,
            started_at: now.to_rfc3339(),
            rate_hz,
        };
        let manifest_json = serde_json::to_string_pretty(&manifest)?;
        fs::write(dir.join(MANIFEST_FILE), manifest_json)?;

        let writer = SessionWriter::create(&dir.join(CSV_FILE), columns)?;
        Ok((manifest, writer))
    }

    /// Session ids present under the root, sorted ascending (ids sort by
    /// start time by construction).
    pub fn list_sessions(&self) -> SessionResult<Vec<String>> {
        let mut sessions = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.path().is_dir() {
                sessions.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        sessions.sort();
        Ok(sessions)
    }

    pub fn load_manifest(&self, session_id: &str) -> SessionResult<SessionManifest> {
        let path = self.root.join(session_id).join(MANIFEST_FILE);
        if !path.exists() {
            return Err(SessionError::SessionNotFound {
                session_id: session_id.to_string(),
            });
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Path to a session's CSV, for the transport layer's download endpoint.
    pub fn csv_path(&self, session_id: &str) -> SessionResult<PathBuf> {
        let path = self.root.join(session_id).join(CSV_FILE);
        if !path.exists() {
            return Err(SessionError::SessionNotFound {
                session_id: session_id.to_string(),
            });
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dq_core::{LoopTelemetry, TickFrame};

    fn temp_root(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "dq-session-{tag}-{}-{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn columns() -> SessionColumns {
        SessionColumns {
            ai: 2,
            tc: 2,
            dout: 2,
            ao: 1,
            loop_names: vec!["heater".to_string()],
        }
    }

    fn frame(t: f64) -> TickFrame {
        TickFrame {
            t,
            ai: vec![1.0, 2.0],
            ao: vec![0.5],
            dout: vec![true, false],
            tc: vec![Some(20.0), None],
            pid: vec![LoopTelemetry {
                name: "heater".to_string(),
                error: 0.1,
                output: 0.9,
                integral: 0.05,
            }],
        }
    }

    #[test]
    fn session_csv_header_and_rows() {
        let root = temp_root("csv");
        let store = SessionStore::new(&root).unwrap();
        let (manifest, mut writer) = store.open_session(10.0, columns()).unwrap();
        writer.write(&frame(1.0)).unwrap();
        writer.write(&frame(1.1)).unwrap();
        writer.close().unwrap();

        let csv = fs::read_to_string(store.csv_path(&manifest.session_id).unwrap()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "t,ai0,ai1,tc0,tc1,do0,do1,ao0,heater_err,heater_out"
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("1.000000,1,2,20,"));
        assert!(row.ends_with(",1,0,0.5,0.1,0.9"));
        assert_eq!(lines.count(), 1);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn rows_keep_the_header_layout_across_shape_changes() {
        let root = temp_root("aligned");
        let store = SessionStore::new(&root).unwrap();
        let (manifest, mut writer) = store.open_session(10.0, columns()).unwrap();

        // Healthy tick, then a failure tick (zeroed analogs, no TC read),
        // then healthy again.
        writer.write(&frame(1.0)).unwrap();
        let failure = TickFrame {
            t: 1.1,
            ai: vec![0.0, 0.0],
            ao: vec![0.5],
            dout: vec![true, false],
            tc: Vec::new(),
            pid: Vec::new(),
        };
        writer.write(&failure).unwrap();
        writer.write(&frame(1.2)).unwrap();
        writer.close().unwrap();

        let csv = fs::read_to_string(store.csv_path(&manifest.session_id).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 4);
        let width = lines[0].split(',').count();
        for line in &lines[1..] {
            assert_eq!(line.split(',').count(), width, "misaligned row: {line}");
        }
        // Failure tick leaves its unavailable cells empty.
        assert_eq!(lines[2], "1.100000,0,0,,,1,0,0.5,,");
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn unknown_loop_telemetry_is_not_written() {
        let root = temp_root("reload");
        let store = SessionStore::new(&root).unwrap();
        let (manifest, mut writer) = store.open_session(10.0, columns()).unwrap();

        // A reloaded loop set with a different name: the heater columns go
        // empty, the new loop gets no columns of its own.
        let mut reloaded = frame(2.0);
        reloaded.pid[0].name = "chiller".to_string();
        writer.write(&reloaded).unwrap();
        writer.close().unwrap();

        let csv = fs::read_to_string(store.csv_path(&manifest.session_id).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0].split(',').count(),
            lines[1].split(',').count()
        );
        assert!(lines[1].ends_with(",,"));
        assert!(!csv.contains("chiller"));
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn manifest_round_trips() {
        let root = temp_root("manifest");
        let store = SessionStore::new(&root).unwrap();
        let (manifest, writer) = store.open_session(50.0, columns()).unwrap();
        writer.close().unwrap();
        let loaded = store.load_manifest(&manifest.session_id).unwrap();
        assert_eq!(loaded, manifest);
        assert_eq!(loaded.rate_hz, 50.0);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn listing_sorts_by_id() {
        let root = temp_root("list");
        let store = SessionStore::new(&root).unwrap();
        fs::create_dir_all(root.join("20240102_000000")).unwrap();
        fs::create_dir_all(root.join("20240101_000000")).unwrap();
        assert_eq!(
            store.list_sessions().unwrap(),
            vec!["20240101_000000", "20240102_000000"]
        );
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_session_is_an_error() {
        let root = temp_root("missing");
        let store = SessionStore::new(&root).unwrap();
        assert!(store.load_manifest("nope").is_err());
        assert!(store.csv_path("nope").is_err());
        let _ = fs::remove_dir_all(&root);
    }
}
