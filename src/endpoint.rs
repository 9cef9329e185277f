//! The consumed capabilities: endpoints and the factory that creates them.
//!
//! A real message-queue library sits behind these traits; the crate itself
//! only ships the in-process implementation in [`crate::transport::inproc`].

use crate::error::LoopError;
use crate::message::Msg;

use async_trait::async_trait;
use bitflags::bitflags;
use std::sync::Arc;

/// Opaque endpoint identity, usable as a map or set key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointId(pub u64);

/// The direction an endpoint moves messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
  /// Write-only endpoint: `send` enqueues toward the peer.
  Push,
  /// Read-only endpoint: `recv` dequeues from the peer.
  Pull,
}

bitflags! {
  /// Event kinds an endpoint can be watched for.
  #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
  pub struct Interest: u8 {
    const READABLE = 0b01;
    const WRITABLE = 0b10;
  }
}

/// A message-queue endpoint handle.
///
/// Endpoints are not safe for concurrent I/O. Once registered with a poller,
/// all `send`/`recv` on the endpoint must happen on the poll task, i.e.
/// inside a handler or a closure passed to [`crate::Poller::sync`].
#[async_trait]
pub trait Endpoint: Send + Sync {
  /// Stable identity used as the registry key.
  fn id(&self) -> EndpointId;

  /// Claim `address` and start accepting peers.
  async fn bind(&self, address: &str) -> Result<(), LoopError>;

  /// Attach to the peer bound at `address`.
  async fn connect(&self, address: &str) -> Result<(), LoopError>;

  /// Send one multi-frame message, suspending while the peer is full.
  async fn send(&self, msg: Msg) -> Result<(), LoopError>;

  /// Receive one multi-frame message, suspending while none is pending.
  async fn recv(&self) -> Result<Msg, LoopError>;

  /// Non-blocking mask of currently pending event kinds. Queried by the
  /// poll primitive after a readiness wait completes.
  fn readiness(&self) -> Interest;

  /// Suspend until at least one kind in `interest` is pending, returning
  /// the pending subset. This is the per-endpoint half of a readiness wait.
  async fn ready(&self, interest: Interest) -> Result<Interest, LoopError>;

  async fn close(&self) -> Result<(), LoopError>;
}

/// Creates endpoints and tears them all down.
#[async_trait]
pub trait EndpointFactory: Send + Sync {
  /// A fresh, unattached endpoint of the requested role.
  fn endpoint(&self, role: Role) -> Result<Arc<dyn Endpoint>, LoopError>;

  /// Tear down every endpoint created by this factory. Afterwards all
  /// endpoint operations report [`LoopError::Terminated`].
  async fn close_all(&self) -> Result<(), LoopError>;
}
