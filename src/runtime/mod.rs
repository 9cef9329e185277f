//! Cross-task plumbing: commands, mailboxes, the notification link.

pub mod command;
pub mod mailbox;
pub mod notify;

pub use command::Command;
pub use mailbox::{mailbox, MailboxReceiver, MailboxSender};
