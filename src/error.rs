use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Error type shared by every fallible operation in the crate.
///
/// The enum is `Clone` (I/O causes are wrapped in `Arc`) because a poller
/// retains its first fatal error and hands it to every caller of `close()`.
#[derive(Error, Debug, Clone)]
#[non_exhaustive] // Allows adding more variants later without breaking change
pub enum LoopError {
  // --- I/O Errors ---
  #[error("I/O error: {0}")]
  Io(Arc<io::Error>),

  // --- Address Errors ---
  #[error("Address already in use: {0}")]
  AddrInUse(String),
  #[error("Address not available: {0}")]
  AddrNotAvailable(String),

  // --- Registration Errors ---
  #[error("Invalid interest set for registration")]
  InvalidInterest,
  #[error("Endpoint/handler pair is not registered")]
  NotRegistered,

  // --- State Errors ---
  #[error("Operation is invalid for the current endpoint state: {0}")]
  InvalidState(&'static str),
  #[error("Poll loop has exited")]
  LoopClosed,

  // --- Teardown ---
  /// The factory that owns the endpoints has been torn down; no further
  /// work is possible. Fatal to a poll loop, but not an application bug.
  #[error("Owning context has been terminated")]
  Terminated,

  // --- Internal Errors ---
  #[error("Internal library error: {0}")]
  Internal(String),
}

impl From<io::Error> for LoopError {
  fn from(e: io::Error) -> Self {
    LoopError::Io(Arc::new(e))
  }
}
