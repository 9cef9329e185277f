//! The wake-up link: a private endpoint pair that lets any task interrupt
//! the poll loop's readiness wait.
//!
//! Each submitted command is paired with exactly one zero-length token sent
//! over this link, so the loop dequeues exactly one command per token it
//! observes readable.

use crate::endpoint::{Endpoint, EndpointFactory, Role};
use crate::error::LoopError;
use crate::message::Msg;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// Source of process-unique in-process addresses for notification links.
///
/// Injected into [`crate::PollerConfig`] rather than read from a global so
/// tests can isolate their own sequence. `default()` clones one
/// process-wide counter, which keeps concurrently started pollers
/// collision-free.
#[derive(Debug, Clone)]
pub struct LinkAddresses {
  prefix: String,
  next: Arc<AtomicU64>,
}

impl LinkAddresses {
  pub fn new(prefix: &str) -> Self {
    Self {
      prefix: prefix.to_string(),
      next: Arc::new(AtomicU64::new(0)),
    }
  }

  /// Hands out the next unique address.
  pub fn next_address(&self) -> String {
    let seq = self.next.fetch_add(1, Ordering::Relaxed);
    format!("{}/{}", self.prefix, seq)
  }
}

impl Default for LinkAddresses {
  fn default() -> Self {
    static PROCESS_WIDE: OnceLock<LinkAddresses> = OnceLock::new();
    PROCESS_WIDE
      .get_or_init(|| LinkAddresses::new("inproc://mqloop/notify"))
      .clone()
  }
}

/// Sending half of the link. Cloneable; usable from any task.
#[derive(Clone)]
pub(crate) struct WakeSender {
  endpoint: Arc<dyn Endpoint>,
}

impl WakeSender {
  /// Enqueue one wake-up token. Suspends only while the link is full, which
  /// resolves as soon as the loop drains a token.
  pub(crate) async fn notify(&self) -> Result<(), LoopError> {
    self.endpoint.send(Msg::from_static(b"")).await
  }

  pub(crate) async fn close(&self) -> Result<(), LoopError> {
    self.endpoint.close().await
  }
}

/// A connected endpoint pair used purely to wake the poll task. The receiver
/// half is polled exclusively by the poll task.
pub(crate) struct NotificationLink {
  pub(crate) sender: WakeSender,
  pub(crate) receiver: Arc<dyn Endpoint>,
}

impl NotificationLink {
  /// Builds the pair over a private unique address: the sender binds, the
  /// receiver connects.
  pub(crate) async fn open(
    factory: &dyn EndpointFactory,
    addresses: &LinkAddresses,
  ) -> Result<NotificationLink, LoopError> {
    let sender = factory.endpoint(Role::Push)?;
    let receiver = factory.endpoint(Role::Pull)?;
    let address = addresses.next_address();
    sender.bind(&address).await?;
    receiver.connect(&address).await?;
    tracing::debug!(%address, "notification link open");
    Ok(NotificationLink {
      sender: WakeSender { endpoint: sender },
      receiver,
    })
  }
}
