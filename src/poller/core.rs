//! The poll task body: readiness wait, per-endpoint dispatch, command
//! execution, teardown.

use crate::endpoint::{Endpoint, EndpointId, Interest};
use crate::error::LoopError;
use crate::events::{Event, EventHandler};
use crate::runtime::command::Command;
use crate::runtime::mailbox::MailboxReceiver;

use super::Shared;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// One (endpoint, handler) pair currently tracked by the loop.
#[derive(Clone)]
struct Registration {
  endpoint: Arc<dyn Endpoint>,
  interest: Interest,
  handler: Arc<dyn EventHandler>,
}

impl Registration {
  /// Pair identity: endpoint id plus handler pointer identity.
  fn matches(&self, id: EndpointId, handler: &Arc<dyn EventHandler>) -> bool {
    self.endpoint.id() == id && Arc::ptr_eq(&self.handler, handler)
  }
}

pub(crate) struct PollerCore {
  items: Vec<Registration>,
  commands: MailboxReceiver,
  wake_receiver: Arc<dyn Endpoint>,
  closing: bool,
  step_timeout: Option<Duration>,
  shared: Arc<Shared>,
  done_tx: watch::Sender<bool>,
}

impl PollerCore {
  pub(crate) fn new(
    wake_receiver: Arc<dyn Endpoint>,
    commands: MailboxReceiver,
    done_tx: watch::Sender<bool>,
    shared: Arc<Shared>,
    step_timeout: Option<Duration>,
  ) -> Self {
    Self {
      items: Vec::new(),
      commands,
      wake_receiver,
      closing: false,
      step_timeout,
      shared,
      done_tx,
    }
  }

  /// Runs until a stop command or a fatal error, then tears down.
  pub(crate) async fn run(mut self) {
    tracing::debug!("poll loop started");
    while !self.closing {
      match self.wait_ready().await {
        Ok(true) => {}
        Ok(false) => continue, // bounded wait elapsed with nothing ready
        Err(error) => {
          // The polled set cannot be trusted after a failed wait; the
          // caller must re-establish the loop.
          tracing::debug!(%error, "readiness wait failed, stopping");
          self.fail(error);
          break;
        }
      }
      self.dispatch_ready().await;
      self.run_pending_command().await;
    }
    self.teardown().await;
  }

  /// Suspends until some registration, or the wake-up receiver, has pending
  /// readiness. Never spins: with no timeout configured this is an
  /// indefinite wait. Returns `Ok(false)` only in stepping mode when the
  /// bound elapses.
  async fn wait_ready(&self) -> Result<bool, LoopError> {
    let mut waits: FuturesUnordered<BoxFuture<'static, Result<Interest, LoopError>>> =
      FuturesUnordered::new();
    for item in &self.items {
      let endpoint = item.endpoint.clone();
      let interest = item.interest;
      waits.push(Box::pin(async move { endpoint.ready(interest).await }));
    }
    let wake = self.wake_receiver.clone();
    waits.push(Box::pin(async move { wake.ready(Interest::READABLE).await }));

    let first = match self.step_timeout {
      None => waits.next().await,
      Some(bound) => match tokio::time::timeout(bound, waits.next()).await {
        Ok(first) => first,
        Err(_) => return Ok(false),
      },
    };
    match first {
      Some(Ok(_)) => Ok(true),
      Some(Err(error)) => Err(error),
      // Unreachable: the wake receiver is always in the set.
      None => Err(LoopError::Internal("empty readiness wait".into())),
    }
  }

  /// Delivers events for every registration whose current readiness mask
  /// overlaps its interest. A handler failure stops the loop, but the rest
  /// of this iteration's ready set is still dispatched.
  async fn dispatch_ready(&mut self) {
    // Commands can edit `items`; they run only after this dispatch, against
    // the loop's own copy, so the snapshot stays consistent.
    let snapshot = self.items.clone();
    for item in snapshot {
      let pending = item.endpoint.readiness() & item.interest;
      if pending.contains(Interest::READABLE) {
        self.dispatch_readable(&item).await;
      }
      if pending.contains(Interest::WRITABLE) {
        self.deliver(&item, Event::Writable).await;
      }
    }
  }

  /// Exactly one receive per readiness observation.
  async fn dispatch_readable(&mut self, item: &Registration) {
    match item.endpoint.recv().await {
      Ok(msg) => self.deliver(item, Event::Readable { msg }).await,
      // Terminated means the owning context is gone; no handler can help.
      Err(LoopError::Terminated) => self.fail(LoopError::Terminated),
      Err(error) => self.deliver(item, Event::Error { error }).await,
    }
  }

  async fn deliver(&mut self, item: &Registration, event: Event) {
    tracing::trace!(endpoint_id = ?item.endpoint.id(), event = event.kind_name(), "dispatch");
    if let Err(error) = item.handler.on_event(event).await {
      tracing::debug!(endpoint_id = ?item.endpoint.id(), %error, "handler reported fatal error");
      self.fail(error);
    }
  }

  /// One token, one command: multiple pending commands take one
  /// notify/poll round-trip each, so a single wake-up can never drain an
  /// unbounded backlog between two consistent views of the polled set.
  async fn run_pending_command(&mut self) {
    if !self.wake_receiver.readiness().contains(Interest::READABLE) {
      return;
    }
    if let Err(error) = self.wake_receiver.recv().await {
      self.fail(error);
      return;
    }
    match self.commands.recv().await {
      Ok(command) => self.run_command(command).await,
      // Every mailbox sender is gone; nothing can reach the loop anymore.
      Err(_) => self.closing = true,
    }
  }

  async fn run_command(&mut self, command: Command) {
    tracing::trace!(command = command.variant_name(), "running command");
    match command {
      Command::Register {
        endpoint,
        interest,
        handler,
        reply_tx,
      } => {
        let _ = reply_tx.send(self.apply_register(endpoint, interest, handler));
      }
      Command::Unregister {
        endpoint,
        interest,
        handler,
        reply_tx,
      } => {
        let _ = reply_tx.send(self.apply_unregister(endpoint.id(), interest, &handler));
      }
      Command::Run { task } => task().await,
      Command::Fail { error } => self.fail(error),
      Command::Stop => self.closing = true,
    }
  }

  fn apply_register(
    &mut self,
    endpoint: Arc<dyn Endpoint>,
    interest: Interest,
    handler: Arc<dyn EventHandler>,
  ) -> Result<(), LoopError> {
    if interest.is_empty() {
      return Err(LoopError::InvalidInterest);
    }
    let id = endpoint.id();
    if let Some(existing) = self.items.iter_mut().find(|item| item.matches(id, &handler)) {
      existing.interest |= interest;
      tracing::debug!(endpoint_id = ?id, interest = ?existing.interest, "widened registration");
      return Ok(());
    }
    tracing::debug!(endpoint_id = ?id, interest = ?interest, "added registration");
    self.items.push(Registration {
      endpoint,
      interest,
      handler,
    });
    Ok(())
  }

  fn apply_unregister(
    &mut self,
    id: EndpointId,
    interest: Interest,
    handler: &Arc<dyn EventHandler>,
  ) -> Result<(), LoopError> {
    let Some(index) = self.items.iter().position(|item| item.matches(id, handler)) else {
      return Err(LoopError::NotRegistered);
    };
    let item = &mut self.items[index];
    item.interest &= !interest;
    if item.interest.is_empty() {
      self.items.remove(index);
      tracing::debug!(endpoint_id = ?id, "removed registration");
    }
    Ok(())
  }

  /// First fatal error wins; later ones are dropped.
  fn fail(&mut self, error: LoopError) {
    let _ = self.shared.fault.set(error);
    self.closing = true;
  }

  /// Unblocks every delivery-queue consumer, then releases the one endpoint
  /// the loop owns. Registered endpoints are left open: the loop never
  /// created them.
  async fn teardown(mut self) {
    tracing::debug!(registrations = self.items.len(), "poll loop stopping");
    for item in self.items.drain(..) {
      item.handler.detached();
    }
    if let Err(error) = self.wake_receiver.close().await {
      tracing::debug!(%error, "wake receiver close failed");
    }
    self.commands.close();
    let _ = self.done_tx.send(true);
  }
}
