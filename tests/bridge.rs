// tests/bridge.rs

use mqloop::{Endpoint, EndpointFactory, LoopError, Msg, Role};
use std::time::Duration;
use tokio::time::timeout;

mod common;

#[tokio::test]
async fn test_bridge_delivers_in_order_exactly_once() -> Result<(), LoopError> {
  let hub = common::test_hub();
  let poller = common::test_poller(&hub).await;

  let pull = hub.endpoint(Role::Pull)?;
  let push = hub.endpoint(Role::Push)?;
  let address = common::unique_address();
  pull.bind(&address).await?;
  push.connect(&address).await?;

  let inbound = poller.start_receiving(pull, 64).await?;
  let outbound = poller.start_sending(push).await?;

  let count = 20;
  for i in 0..count {
    outbound
      .send(Msg::from_vec(format!("Message {}", i).into_bytes()))
      .await
      .expect("sink closed early");
  }

  for i in 0..count {
    let expected = format!("Message {}", i);
    let msg = common::recv_timeout(&inbound, common::LONG_TIMEOUT).await;
    assert_eq!(msg.data(), Some(expected.as_bytes()));
  }
  common::assert_no_message(&inbound, common::SHORT_TIMEOUT).await;

  poller.close().await
}

#[tokio::test]
async fn test_close_with_undrained_buffer_closes_queue() -> Result<(), LoopError> {
  let hub = common::test_hub();
  let poller = common::test_poller(&hub).await;

  let pull = hub.endpoint(Role::Pull)?;
  let push = hub.endpoint(Role::Push)?;
  let address = common::unique_address();
  pull.bind(&address).await?;
  push.connect(&address).await?;

  let inbound = poller.start_receiving(pull, 8).await?;
  for i in 0..3 {
    push
      .send(Msg::from_vec(format!("Buffered {}", i).into_bytes()))
      .await?;
  }

  // Wait until all three have crossed into the delivery queue.
  let deadline = tokio::time::Instant::now() + common::LONG_TIMEOUT;
  while inbound.len() < 3 {
    assert!(
      tokio::time::Instant::now() < deadline,
      "messages never reached the delivery queue"
    );
    tokio::time::sleep(Duration::from_millis(10)).await;
  }

  poller.close().await?;

  // Buffered messages stay readable, then the consumer observes closure
  // instead of hanging.
  for i in 0..3 {
    let expected = format!("Buffered {}", i);
    let msg = inbound.recv().await.expect("buffered message lost");
    assert_eq!(msg.data(), Some(expected.as_bytes()));
  }
  let closed = timeout(common::SHORT_TIMEOUT, inbound.recv()).await;
  assert!(
    matches!(closed, Ok(Err(_))),
    "queue should report closure, got {:?}",
    closed
  );

  Ok(())
}

#[tokio::test]
async fn test_sink_stops_accepting_after_close() -> Result<(), LoopError> {
  let hub = common::test_hub();
  let poller = common::test_poller(&hub).await;

  let pull = hub.endpoint(Role::Pull)?;
  let push = hub.endpoint(Role::Push)?;
  let address = common::unique_address();
  pull.bind(&address).await?;
  push.connect(&address).await?;

  let outbound = poller.start_sending(push).await?;
  outbound
    .send(Msg::from_static(b"first"))
    .await
    .expect("sink rejected message while loop was live");

  poller.close().await?;

  // The pump notices teardown on its next send; the sink closes shortly
  // after instead of accepting messages forever.
  let result = timeout(common::LONG_TIMEOUT, async {
    loop {
      if outbound.send(Msg::from_static(b"later")).await.is_err() {
        break;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
  })
  .await;
  assert!(result.is_ok(), "sink never closed after poller close");

  Ok(())
}

#[tokio::test]
async fn test_two_pollers_share_one_process() -> Result<(), LoopError> {
  // Notification links draw from one process-wide address sequence, so
  // concurrently started pollers must not collide.
  let hub = common::test_hub();
  let first = common::test_poller(&hub).await;
  let second = common::test_poller(&hub).await;

  let pull = hub.endpoint(Role::Pull)?;
  let push = hub.endpoint(Role::Push)?;
  let address = common::unique_address();
  pull.bind(&address).await?;
  push.connect(&address).await?;

  let inbound = first.start_receiving(pull, 8).await?;
  let outbound = second.start_sending(push).await?;

  outbound
    .send(Msg::from_static(b"across pollers"))
    .await
    .expect("sink closed early");
  let msg = common::recv_timeout(&inbound, common::LONG_TIMEOUT).await;
  assert_eq!(msg.data(), Some(&b"across pollers"[..]));

  first.close().await?;
  second.close().await
}
