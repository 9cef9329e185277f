//! mqloop - receive from and send to message-queue endpoints through channels.
//!
//! A message-queue endpoint is not safe to share between tasks. mqloop keeps
//! all endpoint I/O on one poll task: the [`Poller`] polls a dynamically
//! changing set of endpoints for readiness, dispatches per-endpoint handlers,
//! and runs closures submitted from other tasks via [`Poller::sync`]. The
//! channel bridge ([`Poller::start_receiving`], [`Poller::start_sending`])
//! adapts that single-owner world into ordinary bounded queues.

pub mod bridge;
pub mod endpoint;
pub mod error;
pub mod events;
pub mod message;
pub mod poller;
pub mod runtime;
pub mod transport;

// Re-export core types for user convenience
pub use endpoint::{Endpoint, EndpointFactory, EndpointId, Interest, Role};
pub use error::LoopError;
pub use events::{Event, EventHandler};
pub use message::Msg;
pub use poller::{Poller, PollerConfig};
pub use runtime::notify::LinkAddresses;
pub use transport::inproc::Hub;

const VERSION_MAJOR: i32 = 0;
const VERSION_MINOR: i32 = 1;
const VERSION_PATCH: i32 = 0;

/// Returns the library version as a tuple (major, minor, patch).
pub fn version() -> (i32, i32, i32) {
  (VERSION_MAJOR, VERSION_MINOR, VERSION_PATCH)
}
