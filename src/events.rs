//! Event values delivered to registered handlers.

use crate::error::LoopError;
use crate::message::Msg;

use async_trait::async_trait;

/// One readiness observation on a registered endpoint.
#[derive(Debug)]
#[non_exhaustive]
pub enum Event {
  /// One message was received on a readable endpoint.
  Readable { msg: Msg },
  /// The endpoint can accept a send without suspending. Carries no message.
  Writable,
  /// A receive failed on a readable endpoint. Not fatal to the loop unless
  /// the handler makes it so.
  Error { error: LoopError },
}

impl Event {
  pub fn kind_name(&self) -> &'static str {
    match self {
      Event::Readable { .. } => "Readable",
      Event::Writable => "Writable",
      Event::Error { .. } => "Error",
    }
  }
}

/// Capability invoked by the poll task for each event on a registration.
///
/// Handlers run on the poll task and may therefore perform further I/O on
/// the endpoints registered with it.
#[async_trait]
pub trait EventHandler: Send + Sync {
  /// Handle one event. Returning `Err` records the loop's fault and starts
  /// teardown; it is how trusted handler code reports an unrecoverable
  /// condition.
  async fn on_event(&self, event: Event) -> Result<(), LoopError>;

  /// Called exactly once during loop teardown, after which the handler sees
  /// no further events. Delivery-queue handlers close their queue here.
  fn detached(&self) {}
}
