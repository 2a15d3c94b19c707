//! dq-hub: the acquisition/control cycle and its subscribers.
//!
//! The hub owns the periodic sampling tick: it reads the hardware port,
//! conditions the samples, runs the feedback loops, persists each frame to
//! the session log, and fans frames out to live subscribers. The cycle runs
//! exactly while the subscriber set is non-empty — the first subscriber
//! starts it, the last one out stops it.

pub mod cycle;
pub mod hub;
pub mod runtime;
pub mod service;
pub mod sim;

pub use cycle::CycleOptions;
pub use hub::{SubscriberHub, SubscriberId, Subscription};
pub use runtime::{HubRuntime, OutputCommand};
pub use service::HubService;
pub use sim::SimPort;

pub type HubResult<T> = Result<T, HubError>;

#[derive(thiserror::Error, Debug)]
pub enum HubError {
    /// A command or mutation needs a running acquisition cycle.
    #[error("Acquisition cycle is not running")]
    NotRunning,

    /// Opening or closing the device failed; fatal to the current cycle.
    #[error("Hardware port error: {0}")]
    Port(#[from] dq_core::PortError),

    /// Opening the session log failed; fatal to the current cycle.
    #[error("Session error: {0}")]
    Session(#[from] dq_session::SessionError),
}
