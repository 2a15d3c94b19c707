//! dq-config: persisted JSON documents and their validation.
//!
//! Three documents live in the configuration directory: `config.json` (device
//! and channel setup), `pid.json` (feedback loop definitions), and
//! `script.json` (declarative event script, stored but not executed here).
//! Field names match the on-disk JSON consumed by the web front end.

pub mod migrate;
pub mod schema;
pub mod store;
pub mod validate;

pub use schema::*;
pub use store::ConfigStore;
pub use validate::{ValidationError, validate_config, validate_pid_file};

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error in {file}: {source}")]
    Json {
        file: String,
        #[source]
        source: serde_json::Error,
    },
}
