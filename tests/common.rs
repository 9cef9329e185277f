// tests/common.rs
#![allow(dead_code)] // Helpers are shared across test binaries

use async_channel::Receiver;
use async_trait::async_trait;
use mqloop::{Event, EventHandler, Hub, LoopError, Msg, Poller, PollerConfig};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Once;
use std::time::Duration;

use tokio::time::timeout;

pub const SHORT_TIMEOUT: Duration = Duration::from_millis(250);
pub const LONG_TIMEOUT: Duration = Duration::from_secs(2);

static ADDRESS_COUNTER: AtomicUsize = AtomicUsize::new(0);

// Use std::sync::Once for one-time initialization
static TRACING_INIT: Once = Once::new();

// Setup function to initialize tracing; RUST_LOG overrides the default.
fn setup_tracing() {
  TRACING_INIT.call_once(|| {
    let default_filter = "mqloop=trace,debug";
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let subscriber = FmtSubscriber::builder()
      .with_env_filter(env_filter)
      .with_target(true)
      .with_test_writer() // Write to test output capture
      .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
  });
}

// Helper to create a hub with tracing initialized
pub fn test_hub() -> Hub {
  setup_tracing();
  Hub::new()
}

// Helper to start a poller with default configuration
pub async fn test_poller(hub: &Hub) -> Poller {
  Poller::start(hub, PollerConfig::default())
    .await
    .expect("failed to start poller")
}

// Helper to generate unique inproc addresses so parallel tests never collide
pub fn unique_address() -> String {
  let pid = std::process::id();
  let count = ADDRESS_COUNTER.fetch_add(1, Ordering::Relaxed);
  format!("inproc://mqloop_test_{}_{}", pid, count)
}

// Helper for recv with timeout assertion
pub async fn recv_timeout(queue: &Receiver<Msg>, duration: Duration) -> Msg {
  timeout(duration, queue.recv())
    .await
    .expect("timed out waiting for message")
    .expect("delivery queue closed early")
}

// Asserts that nothing arrives on `queue` within `duration`. A closed queue
// also qualifies: no message is no message.
pub async fn assert_no_message(queue: &Receiver<Msg>, duration: Duration) {
  if let Ok(Ok(msg)) = timeout(duration, queue.recv()).await {
    panic!("expected no message, got {:?}", msg);
  }
}

/// Handler that forwards received messages into a plain channel.
pub struct Forward {
  pub tx: async_channel::Sender<Msg>,
}

#[async_trait]
impl EventHandler for Forward {
  async fn on_event(&self, event: Event) -> Result<(), LoopError> {
    if let Event::Readable { msg } = event {
      let _ = self.tx.send(msg).await;
    }
    Ok(())
  }
}
