//! Error types for feedback loop operations.

use thiserror::Error;

/// Result type for feedback loop operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors raised while loading a loop set.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    /// Invalid argument provided to a control function.
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// A loop references a channel the device does not have.
    #[error("Unresolvable channel: {what}")]
    UnresolvableChannel { what: String },

    /// A loop uses a source or output kind the engine does not run.
    #[error("Unsupported loop wiring: {what}")]
    Unsupported { what: String },

    /// Two loops share the same name.
    #[error("Duplicate loop name: {name}")]
    DuplicateName { name: String },
}
