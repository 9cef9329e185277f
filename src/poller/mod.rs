//! The poll loop: single owner of all registered endpoint I/O.

mod core;

use crate::endpoint::{Endpoint, EndpointFactory, Interest};
use crate::error::LoopError;
use crate::events::EventHandler;
use crate::runtime::command::Command;
use crate::runtime::mailbox::{mailbox, MailboxSender, DEFAULT_COMMAND_CAPACITY};
use crate::runtime::notify::{LinkAddresses, NotificationLink, WakeSender};

use self::core::PollerCore;

use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::{oneshot, watch};

/// Tuning knobs for a poller.
#[derive(Debug, Clone)]
pub struct PollerConfig {
  /// Capacity of the command mailbox. A full mailbox suspends submitters
  /// until the loop catches up.
  pub command_capacity: usize,
  /// Bounds each readiness wait. Leave `None` in production so the loop is
  /// purely event-driven; a finite value is the degraded stepping mode used
  /// for bounded-iteration testing. An elapsed wait dispatches nothing.
  pub step_timeout: Option<Duration>,
  /// Address source for the private notification link.
  pub link_addresses: LinkAddresses,
}

impl Default for PollerConfig {
  fn default() -> Self {
    Self {
      command_capacity: DEFAULT_COMMAND_CAPACITY,
      step_timeout: None,
      link_addresses: LinkAddresses::default(),
    }
  }
}

/// State shared between the handle and the poll task.
pub(crate) struct Shared {
  pub(crate) mailbox: MailboxSender,
  pub(crate) wake: WakeSender,
  /// First fatal error, write-once. Read only after `done` is published.
  pub(crate) fault: OnceLock<LoopError>,
  pub(crate) done: watch::Receiver<bool>,
}

/// Cloneable handle to a running poll loop.
///
/// All mutation of the polled set and all endpoint I/O funnel through
/// commands executed on the poll task; the handle never touches loop state
/// directly. Dropping every handle does not stop the loop; call
/// [`Poller::close`].
#[derive(Clone)]
pub struct Poller {
  shared: Arc<Shared>,
}

impl Poller {
  /// Spawns the poll task. The factory is used once, to build the private
  /// notification link; polled endpoints arrive later through `register`.
  pub async fn start(
    factory: &dyn EndpointFactory,
    config: PollerConfig,
  ) -> Result<Poller, LoopError> {
    let link = NotificationLink::open(factory, &config.link_addresses).await?;
    let (command_tx, command_rx) = mailbox(config.command_capacity);
    let (done_tx, done_rx) = watch::channel(false);
    let shared = Arc::new(Shared {
      mailbox: command_tx,
      wake: link.sender,
      fault: OnceLock::new(),
      done: done_rx,
    });
    let core = PollerCore::new(
      link.receiver,
      command_rx,
      done_tx,
      shared.clone(),
      config.step_timeout,
    );
    tokio::spawn(core.run());
    Ok(Poller { shared })
  }

  /// Adds `interest` for the (endpoint, handler) pair. Re-registering an
  /// existing pair widens its interest set.
  ///
  /// The endpoint must already be bound or connected; from this point on it
  /// belongs to the poll task and must not be used elsewhere except through
  /// [`Poller::sync`].
  pub async fn register(
    &self,
    endpoint: Arc<dyn Endpoint>,
    interest: Interest,
    handler: Arc<dyn EventHandler>,
  ) -> Result<(), LoopError> {
    let (reply_tx, reply_rx) = oneshot::channel();
    self
      .submit(Command::Register {
        endpoint,
        interest,
        handler,
        reply_tx,
      })
      .await?;
    reply_rx.await.map_err(|_| LoopError::LoopClosed)?
  }

  /// Withdraws `interest` from the pair; the registration is removed once
  /// its interest set empties. Returns [`LoopError::NotRegistered`] if the
  /// pair is not tracked.
  pub async fn unregister(
    &self,
    endpoint: Arc<dyn Endpoint>,
    interest: Interest,
    handler: Arc<dyn EventHandler>,
  ) -> Result<(), LoopError> {
    let (reply_tx, reply_rx) = oneshot::channel();
    self
      .submit(Command::Unregister {
        endpoint,
        interest,
        handler,
        reply_tx,
      })
      .await?;
    reply_rx.await.map_err(|_| LoopError::LoopClosed)?
  }

  /// Schedules `f` to run on the poll task, which alone may operate on
  /// registered endpoints.
  ///
  /// Fire-and-forget: completion is observed only through state captured by
  /// the closure. Commands submitted by one task run in submission order;
  /// a `register` followed by a `sync` from the same task sees the
  /// registration in place.
  pub async fn sync<F, Fut>(&self, f: F) -> Result<(), LoopError>
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    self
      .submit(Command::Run {
        task: Box::new(move || Box::pin(f())),
      })
      .await
  }

  /// Stops the loop and waits for it to finish. Idempotent; every caller
  /// observes the retained fault if polling failed before the close.
  pub async fn close(&self) -> Result<(), LoopError> {
    // Best effort: the loop may already be gone, which is fine.
    let _ = self.submit(Command::Stop).await;
    let mut done = self.shared.done.clone();
    loop {
      if *done.borrow_and_update() {
        break;
      }
      if done.changed().await.is_err() {
        break;
      }
    }
    let _ = self.shared.wake.close().await;
    match self.shared.fault.get() {
      Some(error) => Err(error.clone()),
      None => Ok(()),
    }
  }

  /// Enqueue the command, then send exactly one wake-up token. The command
  /// goes first so a caller dropped between the two steps can never leave a
  /// token with no command behind it; the loop runs one command per token,
  /// which keeps command execution rate-matched to notifications.
  pub(crate) async fn submit(&self, command: Command) -> Result<(), LoopError> {
    self
      .shared
      .mailbox
      .send(command)
      .await
      .map_err(|_| LoopError::LoopClosed)?;
    self.shared.wake.notify().await
  }
}
