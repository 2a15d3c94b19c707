//! dq-controls: PID feedback loops driving hardware outputs.
//!
//! Each configured loop maps one sensed channel to one actuator command per
//! tick. Loops are validated when a loop set is loaded, never at tick time;
//! the acquisition cycle must never fail a tick because of a bad loop
//! definition.

pub mod engine;
pub mod error;
pub mod loop_config;

pub use engine::{Engine, IoLayout, LoopRejection};
pub use error::{ControlError, ControlResult};
pub use loop_config::{LoopConfig, OutputKind, SourceKind};
