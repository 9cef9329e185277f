//! Messages exchanged between application tasks and the poll task.

use crate::endpoint::{Endpoint, Interest};
use crate::error::LoopError;
use crate::events::EventHandler;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::oneshot; // Using tokio's oneshot for replies

/// A zero-argument closure scheduled to run exactly once on the poll task.
pub type Task = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// Commands serialized through the mailbox. The poll task runs exactly one
/// command per wake-up token it consumes.
pub enum Command {
  /// Add interest for an (endpoint, handler) pair, creating the
  /// registration or widening an existing one.
  Register {
    endpoint: Arc<dyn Endpoint>,
    interest: Interest,
    handler: Arc<dyn EventHandler>,
    reply_tx: oneshot::Sender<Result<(), LoopError>>,
  },
  /// Withdraw interest; the registration is dropped once its set empties.
  Unregister {
    endpoint: Arc<dyn Endpoint>,
    interest: Interest,
    handler: Arc<dyn EventHandler>,
    reply_tx: oneshot::Sender<Result<(), LoopError>>,
  },
  /// Run an arbitrary closure with the poll task's exclusive right to touch
  /// registered endpoints.
  Run { task: Task },
  /// A helper task reporting a fatal error (e.g. a send pump).
  Fail { error: LoopError },
  /// Begin teardown after the current iteration.
  Stop,
}

impl Command {
  pub fn variant_name(&self) -> &'static str {
    match self {
      Command::Register { .. } => "Register",
      Command::Unregister { .. } => "Unregister",
      Command::Run { .. } => "Run",
      Command::Fail { .. } => "Fail",
      Command::Stop => "Stop",
    }
  }
}

impl fmt::Debug for Command {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.variant_name())
  }
}
