//! dq-session: per-session acquisition logs.
//!
//! One continuous run of the acquisition cycle gets one session directory
//! under the log root, named by its start time. Each session holds a small
//! JSON manifest and a CSV time series with one row per recorded tick.

pub mod store;
pub mod types;
pub mod writer;

pub use store::SessionStore;
pub use types::{SessionColumns, SessionManifest};
pub use writer::SessionWriter;

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },
}
