//! In-process endpoints: bounded FIFO queues addressed by name.
//!
//! This is the transport the notification link rides on, and the reference
//! implementation the test suite polls. One address owns one queue; `Push`
//! endpoints write to it and `Pull` endpoints read from it. Addresses are
//! single-use: a binding stays claimed until the hub is torn down.

use crate::endpoint::{Endpoint, EndpointFactory, EndpointId, Interest, Role};
use crate::error::LoopError;
use crate::message::Msg;

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tokio::sync::Notify;

/// Default bound for each address's queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

// --- Queue ---

struct QueueState {
  messages: VecDeque<Msg>,
  closed: bool,
}

/// One bounded FIFO shared by the endpoints attached to an address.
struct Queue {
  state: Mutex<QueueState>,
  capacity: usize,
  /// Signalled on every push, pop, and close; waiters re-check state.
  changed: Notify,
}

impl Queue {
  fn new(capacity: usize) -> Arc<Queue> {
    Arc::new(Queue {
      state: Mutex::new(QueueState {
        messages: VecDeque::new(),
        closed: false,
      }),
      capacity: capacity.max(1),
      changed: Notify::new(),
    })
  }

  fn lock(&self) -> MutexGuard<'_, QueueState> {
    self.state.lock().expect("inproc queue state poisoned")
  }

  async fn push(&self, msg: Msg) -> Result<(), LoopError> {
    loop {
      // Register for wakeups before checking state, or a notify_waiters
      // between the check and the await would be lost.
      let changed = self.changed.notified();
      tokio::pin!(changed);
      changed.as_mut().enable();
      {
        let mut state = self.lock();
        if state.closed {
          return Err(LoopError::Terminated);
        }
        if state.messages.len() < self.capacity {
          state.messages.push_back(msg);
          drop(state);
          self.changed.notify_waiters();
          return Ok(());
        }
      }
      changed.await;
    }
  }

  async fn pop(&self) -> Result<Msg, LoopError> {
    loop {
      let changed = self.changed.notified();
      tokio::pin!(changed);
      changed.as_mut().enable();
      {
        let mut state = self.lock();
        if state.closed {
          return Err(LoopError::Terminated);
        }
        if let Some(msg) = state.messages.pop_front() {
          drop(state);
          self.changed.notify_waiters();
          return Ok(msg);
        }
      }
      changed.await;
    }
  }

  /// Non-blocking mask as seen from `role`'s side. A closed queue is never
  /// ready; suspended operations learn of closure through `Terminated`.
  fn readiness(&self, role: Role) -> Interest {
    let state = self.lock();
    if state.closed {
      return Interest::empty();
    }
    match role {
      Role::Pull if !state.messages.is_empty() => Interest::READABLE,
      Role::Push if state.messages.len() < self.capacity => Interest::WRITABLE,
      _ => Interest::empty(),
    }
  }

  async fn ready(&self, role: Role, interest: Interest) -> Result<Interest, LoopError> {
    loop {
      let changed = self.changed.notified();
      tokio::pin!(changed);
      changed.as_mut().enable();
      {
        let state = self.lock();
        if state.closed {
          return Err(LoopError::Terminated);
        }
        let mut pending = Interest::empty();
        if matches!(role, Role::Pull) && !state.messages.is_empty() {
          pending |= Interest::READABLE;
        }
        if matches!(role, Role::Push) && state.messages.len() < self.capacity {
          pending |= Interest::WRITABLE;
        }
        pending &= interest;
        if !pending.is_empty() {
          return Ok(pending);
        }
      }
      changed.await;
    }
  }

  fn close(&self) {
    let mut state = self.lock();
    state.closed = true;
    drop(state);
    self.changed.notify_waiters();
  }
}

// --- Hub ---

struct HubState {
  bindings: HashMap<String, Arc<Queue>>,
  terminated: bool,
}

struct HubInner {
  state: Mutex<HubState>,
  queue_capacity: usize,
  next_endpoint_id: AtomicU64,
}

impl HubInner {
  fn lock(&self) -> MutexGuard<'_, HubState> {
    self.state.lock().expect("hub state poisoned")
  }

  fn bind(&self, address: &str) -> Result<Arc<Queue>, LoopError> {
    let mut state = self.lock();
    if state.terminated {
      return Err(LoopError::Terminated);
    }
    if state.bindings.contains_key(address) {
      return Err(LoopError::AddrInUse(address.to_string()));
    }
    let queue = Queue::new(self.queue_capacity);
    state.bindings.insert(address.to_string(), queue.clone());
    Ok(queue)
  }

  fn release(&self, address: &str) {
    self.lock().bindings.remove(address);
  }

  fn lookup(&self, address: &str) -> Result<Arc<Queue>, LoopError> {
    let state = self.lock();
    if state.terminated {
      return Err(LoopError::Terminated);
    }
    state
      .bindings
      .get(address)
      .cloned()
      .ok_or_else(|| LoopError::AddrNotAvailable(address.to_string()))
  }
}

/// In-process endpoint factory.
///
/// A hub remembers every address bound through it;
/// [`EndpointFactory::close_all`] closes every queue and leaves further
/// endpoint operations reporting [`LoopError::Terminated`]. Handles are
/// cheap clones of shared state.
#[derive(Clone)]
pub struct Hub {
  inner: Arc<HubInner>,
}

impl Hub {
  pub fn new() -> Hub {
    Hub::with_queue_capacity(DEFAULT_QUEUE_CAPACITY)
  }

  /// A hub whose queues hold at most `capacity` messages; senders suspend
  /// past that point.
  pub fn with_queue_capacity(capacity: usize) -> Hub {
    Hub {
      inner: Arc::new(HubInner {
        state: Mutex::new(HubState {
          bindings: HashMap::new(),
          terminated: false,
        }),
        queue_capacity: capacity.max(1),
        next_endpoint_id: AtomicU64::new(1),
      }),
    }
  }
}

impl Default for Hub {
  fn default() -> Hub {
    Hub::new()
  }
}

#[async_trait]
impl EndpointFactory for Hub {
  fn endpoint(&self, role: Role) -> Result<Arc<dyn Endpoint>, LoopError> {
    if self.inner.lock().terminated {
      return Err(LoopError::Terminated);
    }
    let id = EndpointId(self.inner.next_endpoint_id.fetch_add(1, Ordering::Relaxed));
    tracing::debug!(endpoint_id = ?id, role = ?role, "created inproc endpoint");
    Ok(Arc::new(InprocEndpoint {
      id,
      role,
      hub: self.inner.clone(),
      queue: OnceLock::new(),
    }))
  }

  async fn close_all(&self) -> Result<(), LoopError> {
    let queues: Vec<Arc<Queue>> = {
      let mut state = self.inner.lock();
      if state.terminated {
        return Ok(());
      }
      state.terminated = true;
      state.bindings.drain().map(|(_, queue)| queue).collect()
    };
    tracing::debug!(queues = queues.len(), "hub terminated, closing all queues");
    for queue in queues {
      queue.close();
    }
    Ok(())
  }
}

// --- Endpoint ---

/// One side of an inproc queue. Attached to an address by `bind` or
/// `connect`, exactly once.
struct InprocEndpoint {
  id: EndpointId,
  role: Role,
  hub: Arc<HubInner>,
  queue: OnceLock<Arc<Queue>>,
}

impl InprocEndpoint {
  fn attached(&self) -> Result<&Arc<Queue>, LoopError> {
    self
      .queue
      .get()
      .ok_or(LoopError::InvalidState("endpoint is not bound or connected"))
  }

  fn attach(&self, queue: Arc<Queue>) -> Result<(), LoopError> {
    self
      .queue
      .set(queue)
      .map_err(|_| LoopError::InvalidState("endpoint is already attached"))
  }
}

#[async_trait]
impl Endpoint for InprocEndpoint {
  fn id(&self) -> EndpointId {
    self.id
  }

  async fn bind(&self, address: &str) -> Result<(), LoopError> {
    let queue = self.hub.bind(address)?;
    match self.attach(queue) {
      Ok(()) => {
        tracing::debug!(endpoint_id = ?self.id, address, "bound");
        Ok(())
      }
      Err(error) => {
        self.hub.release(address);
        Err(error)
      }
    }
  }

  async fn connect(&self, address: &str) -> Result<(), LoopError> {
    let queue = self.hub.lookup(address)?;
    self.attach(queue)?;
    tracing::debug!(endpoint_id = ?self.id, address, "connected");
    Ok(())
  }

  async fn send(&self, msg: Msg) -> Result<(), LoopError> {
    if !matches!(self.role, Role::Push) {
      return Err(LoopError::InvalidState("pull endpoint cannot send"));
    }
    self.attached()?.push(msg).await
  }

  async fn recv(&self) -> Result<Msg, LoopError> {
    if !matches!(self.role, Role::Pull) {
      return Err(LoopError::InvalidState("push endpoint cannot receive"));
    }
    self.attached()?.pop().await
  }

  fn readiness(&self) -> Interest {
    match self.queue.get() {
      Some(queue) => queue.readiness(self.role),
      None => Interest::empty(),
    }
  }

  async fn ready(&self, interest: Interest) -> Result<Interest, LoopError> {
    self.attached()?.ready(self.role, interest).await
  }

  /// Closes the attached queue for both sides. Idempotent; a detached
  /// endpoint closes trivially.
  async fn close(&self) -> Result<(), LoopError> {
    if let Some(queue) = self.queue.get() {
      queue.close();
    }
    Ok(())
  }
}
