//! Type aliases for the poller's command channel based on `async-channel`.

use crate::runtime::command::Command;

/// The sending end of a poller's command mailbox. Cloneable.
pub type MailboxSender = async_channel::Sender<Command>;

/// The receiving end, consumed only by the poll task.
pub type MailboxReceiver = async_channel::Receiver<Command>;

/// Default capacity for bounded command mailboxes.
pub const DEFAULT_COMMAND_CAPACITY: usize = 128; // Tunable

/// Creates a new bounded command mailbox pair. A full mailbox suspends
/// submitters; this is the crate's backpressure point, not an error.
pub fn mailbox(capacity: usize) -> (MailboxSender, MailboxReceiver) {
  async_channel::bounded(capacity.max(1))
}
