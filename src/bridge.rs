//! The channel bridge: endpoint streams as queues usable from any task.

use crate::endpoint::{Endpoint, Interest};
use crate::error::LoopError;
use crate::events::{Event, EventHandler};
use crate::message::Msg;
use crate::poller::Poller;
use crate::runtime::command::Command;

use async_channel::{Receiver, Sender};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Forwards every received message into a bounded delivery queue.
struct ChannelHandler {
  delivery: Sender<Msg>,
}

#[async_trait]
impl EventHandler for ChannelHandler {
  async fn on_event(&self, event: Event) -> Result<(), LoopError> {
    match event {
      Event::Readable { msg } => {
        // A full queue suspends the poll task right here, stalling every
        // other endpoint until the consumer catches up. A vanished
        // consumer just discards the message.
        let _ = self.delivery.send(msg).await;
        Ok(())
      }
      // Queue consumers never see receive errors, only queue closure.
      Event::Error { .. } => Ok(()),
      Event::Writable => Ok(()),
    }
  }

  fn detached(&self) {
    self.delivery.close();
  }
}

impl Poller {
  /// Registers `endpoint` for reading and returns the queue its messages
  /// are delivered to, in arrival order.
  ///
  /// The queue holds at most `buffer` messages; while it is full the poll
  /// task is suspended and nothing else is polled. Size the buffer for the
  /// consumer's pace, or drain promptly. The queue closes when the loop
  /// stops; messages already buffered stay readable.
  pub async fn start_receiving(
    &self,
    endpoint: Arc<dyn Endpoint>,
    buffer: usize,
  ) -> Result<Receiver<Msg>, LoopError> {
    let (delivery, queue) = async_channel::bounded(buffer.max(1));
    let handler = Arc::new(ChannelHandler { delivery });
    self.register(endpoint, Interest::READABLE, handler).await?;
    Ok(queue)
  }

  /// Returns a sink whose messages are sent on `endpoint` from inside the
  /// poll task, one at a time, in order.
  ///
  /// The pump waits for each send's completion before taking the next
  /// message, so a send that suspends (peer full) also holds up the sink,
  /// not just the loop. The pump exits quietly when the endpoint's context
  /// terminates or the sink is dropped; any other send failure becomes the
  /// loop's fault.
  pub async fn start_sending(&self, endpoint: Arc<dyn Endpoint>) -> Result<Sender<Msg>, LoopError> {
    let (sink, pending) = async_channel::bounded::<Msg>(1);
    let poller = self.clone();
    tokio::spawn(async move {
      while let Ok(msg) = pending.recv().await {
        let (done_tx, done_rx) = oneshot::channel();
        let target = endpoint.clone();
        let scheduled = poller
          .sync(move || async move {
            let _ = done_tx.send(target.send(msg).await);
          })
          .await;
        if scheduled.is_err() {
          break;
        }
        match done_rx.await {
          Ok(Ok(())) => {}
          Ok(Err(LoopError::Terminated)) => break,
          Ok(Err(error)) => {
            tracing::debug!(%error, "send pump failed, stopping loop");
            let _ = poller.submit(Command::Fail { error }).await;
            break;
          }
          // The loop dropped the command during teardown.
          Err(_) => break,
        }
      }
      tracing::debug!("send pump finished");
    });
    Ok(sink)
  }
}
