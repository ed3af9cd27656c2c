//! Correlation and polling guarantees of request/reply endpoints

use endpoint::{DirectChannel, DirectSyncEndpoint, Endpoint, EndpointConfiguration};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use types::{Message, TestContext};

const POLLING: Duration = Duration::from_millis(10);

fn configuration(timeout_ms: u64) -> EndpointConfiguration {
    EndpointConfiguration::new()
        .with_timeout(Duration::from_millis(timeout_ms))
        .with_polling_interval(POLLING)
}

fn client(channel: &Arc<DirectChannel>, name: &str, timeout_ms: u64) -> DirectSyncEndpoint {
    let endpoint = DirectSyncEndpoint::new(name, channel.clone(), configuration(timeout_ms));
    // the first producer fixes the requesting role
    endpoint.create_producer();
    endpoint
}

#[tokio::test(start_paused = true)]
async fn test_reply_is_delivered_once_then_times_out() {
    let channel = Arc::new(DirectChannel::new("round-trip"));
    let client = client(&channel, "client", 200);
    let server = DirectSyncEndpoint::new("server", channel, configuration(200));
    let context = TestContext::new();

    let request = Message::new("ping").with_header("operation", "foo");
    client
        .create_producer()
        .send(request.clone(), &context)
        .await
        .unwrap();

    let received = server.create_consumer().receive(&context, None).await.unwrap();
    assert_eq!(received.id(), request.id());

    let reply = Message::reply_for(&received, "pong");
    server
        .create_producer()
        .send(reply.clone(), &context)
        .await
        .unwrap();

    let consumer = client.create_consumer();
    let first = consumer.receive(&context, None).await.unwrap();
    assert_eq!(first.id(), reply.id());
    assert_eq!(first.payload().as_text(), "pong");
    assert!(channel_is_drained(&client));

    let second = consumer.receive(&context, None).await.unwrap_err();
    assert!(second.is_timeout());
}

fn channel_is_drained(endpoint: &DirectSyncEndpoint) -> bool {
    endpoint.channel().replies().is_empty()
}

#[tokio::test(start_paused = true)]
async fn test_receive_returns_within_timeout_plus_polling_interval() {
    let channel = Arc::new(DirectChannel::new("precision"));
    let client = client(&channel, "client", 100);
    let context = TestContext::new();

    let started = Instant::now();
    let err = client
        .create_consumer()
        .receive_selective("missing", &context, None)
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(100), "{:?}", elapsed);
    assert!(elapsed <= Duration::from_millis(100) + POLLING, "{:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_reply_arriving_mid_wait_returns_early() {
    let channel = Arc::new(DirectChannel::new("early"));
    let client = client(&channel, "client", 1_000);
    let context = TestContext::new();

    let replies = channel.replies().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        replies.store("order-7", Message::new("ready"));
    });

    let started = Instant::now();
    let reply = client
        .create_consumer()
        .receive_selective("order-7", &context, None)
        .await
        .unwrap();

    assert_eq!(reply.payload().as_text(), "ready");
    assert!(started.elapsed() < Duration::from_millis(150) + 2 * POLLING);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_receives_never_share_a_reply() {
    let channel = Arc::new(DirectChannel::new("contended"));
    let first = client(&channel, "first", 200);
    let second = client(&channel, "second", 200);
    let context = TestContext::new();

    channel.replies().store("key-1", Message::new("only"));

    let (first, second) = (first.create_consumer(), second.create_consumer());
    let (a, b) = tokio::join!(
        first.receive_selective("key-1", &context, None),
        second.receive_selective("key-1", &context, None),
    );

    let delivered = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(delivered, 1);
    let failed = if a.is_ok() { b } else { a };
    assert!(failed.unwrap_err().is_timeout());
}

#[tokio::test(start_paused = true)]
async fn test_replies_under_one_key_are_queued_in_order() {
    let channel = Arc::new(DirectChannel::new("fifo"));
    let client = client(&channel, "client", 100);
    let context = TestContext::new();

    channel.replies().store("dup", Message::new("first"));
    channel.replies().store("dup", Message::new("second"));

    let consumer = client.create_consumer();
    for expected in ["first", "second"] {
        let reply = consumer
            .receive_selective("dup", &context, None)
            .await
            .unwrap();
        assert_eq!(reply.payload().as_text(), expected);
    }
    assert!(consumer
        .receive_selective("dup", &context, None)
        .await
        .unwrap_err()
        .is_timeout());
}

#[tokio::test]
async fn test_unanswered_request_times_out_in_wall_clock_time() {
    let channel = Arc::new(DirectChannel::new("silent"));
    let client = client(&channel, "client", 100);
    let context = TestContext::new();

    client
        .create_producer()
        .send(Message::new("Bar").with_header("operation", "foo"), &context)
        .await
        .unwrap();

    let started = std::time::Instant::now();
    let err = client
        .create_consumer()
        .receive(&context, None)
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert!(err.is_timeout());
    assert!(err.to_string().contains("100 milliseconds"), "{}", err);
    assert!(elapsed >= Duration::from_millis(100), "{:?}", elapsed);
    // generous upper bound for loaded machines, the poll itself ends at ~110 ms
    assert!(elapsed < Duration::from_millis(300), "{:?}", elapsed);
}
