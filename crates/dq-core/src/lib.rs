//! dq-core: stable foundation for daqflow.
//!
//! Contains:
//! - frame (tick frames and the wire message envelope)
//! - port (the hardware port contract the acquisition cycle drives)

pub mod frame;
pub mod port;

// Re-exports: nice ergonomics for downstream crates
pub use frame::*;
pub use port::*;
