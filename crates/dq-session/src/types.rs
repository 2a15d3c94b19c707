//! Session metadata.

use serde::{Deserialize, Serialize};

/// Manifest written once when a session opens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionManifest {
    /// Directory name, `YYYYmmdd_HHMMSS` of the start instant.
    pub session_id: String,
    /// RFC 3339 start timestamp.
    pub started_at: String,
    /// Sample rate the cycle started with.
    pub rate_hz: f64,
}

/// CSV column layout, fixed for the lifetime of a session.
///
/// Derived from the configuration epoch the cycle starts with, not from the
/// frames themselves: frame shape legally varies mid-session (a failed read
/// yields an empty thermocouple vector, a loop reload changes the telemetry
/// set), and rows must stay aligned with the header regardless.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionColumns {
    pub ai: usize,
    pub tc: usize,
    pub dout: usize,
    pub ao: usize,
    /// Loaded loop names in run order; each contributes an `_err` and an
    /// `_out` column.
    pub loop_names: Vec<String>,
}
