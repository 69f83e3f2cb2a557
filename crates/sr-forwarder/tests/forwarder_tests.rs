//! Forwarder Tests
//!
//! Tests for:
//! - Successful delivery producing exactly one success outcome
//! - Failed delivery producing exactly one failure outcome
//! - Bounded retry when explicitly enabled
//! - Poison parsed-queue entries being dropped

use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sr_common::{ForwardingOutcome, ParsedSignal, RawMessage, Shutdown, SignalKind, SourceKind};
use sr_forwarder::{Forwarder, ForwarderConfig, TelegramTransport, TransportConfig};
use sr_queue::{dequeue_json, MemoryQueue, SignalQueue, OUTCOME_QUEUE, PARSED_QUEUE};

const TARGET_CHAT: i64 = -1002773853382;

fn test_signal() -> ParsedSignal {
    let raw = RawMessage {
        text: "BTC/USDT Target #1 Done ✅".to_string(),
        chat_id: -1002299206473,
        message_id: 1,
        sender_id: 1,
        timestamp: "2025-08-24T12:00:00Z".parse().unwrap(),
        source: SourceKind::Test,
    };
    ParsedSignal {
        kind: SignalKind::TradingUpdate,
        original_text: raw.text.clone(),
        formatted_text: raw.text.clone(),
        parsed_data: None,
        source_chat_id: raw.chat_id,
        metadata: serde_json::to_value(&raw).unwrap(),
    }
}

fn forwarder(queue: Arc<MemoryQueue>, server: &MockServer) -> Forwarder {
    let transport = Arc::new(TelegramTransport::new(server.uri(), "test-token"));
    Forwarder::new(
        queue,
        transport,
        ForwarderConfig {
            target_chat_id: TARGET_CHAT,
            poll_timeout: Duration::from_millis(100),
        },
        Shutdown::new(),
    )
}

async fn pop_outcome(queue: &MemoryQueue) -> ForwardingOutcome {
    dequeue_json(queue, OUTCOME_QUEUE, Duration::from_millis(100))
        .await
        .unwrap()
        .expect("missing outcome record")
}

#[tokio::test]
async fn successful_delivery_records_one_success_outcome() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bottest-token/sendMessage"))
        .and(body_partial_json(serde_json::json!({
            "chat_id": TARGET_CHAT,
            "parse_mode": "Markdown",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let queue = Arc::new(MemoryQueue::new());
    let forwarder = forwarder(queue.clone(), &server);

    assert!(forwarder.forward(test_signal()).await);

    let outcome = pop_outcome(&queue).await;
    assert!(outcome.success);
    assert_eq!(outcome.action, "signal_forwarded");
    assert_eq!(outcome.source_chat_id, -1002299206473);
    assert_eq!(outcome.target_chat_id, TARGET_CHAT);
    assert_eq!(queue.len(OUTCOME_QUEUE).await.unwrap(), 0);
}

#[tokio::test]
async fn failed_delivery_records_one_failure_outcome() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bottest-token/sendMessage"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(serde_json::json!({"ok": false})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let queue = Arc::new(MemoryQueue::new());
    let forwarder = forwarder(queue.clone(), &server);

    assert!(!forwarder.forward(test_signal()).await);

    let outcome = pop_outcome(&queue).await;
    assert!(!outcome.success);
    // no second outcome for the same signal
    assert_eq!(queue.len(OUTCOME_QUEUE).await.unwrap(), 0);
}

#[tokio::test]
async fn unreachable_transport_is_a_delivery_failure() {
    let queue = Arc::new(MemoryQueue::new());
    let transport = Arc::new(TelegramTransport::with_config(
        // nothing listens here
        "http://127.0.0.1:9",
        "test-token",
        TransportConfig {
            timeout: Duration::from_millis(500),
            connect_timeout: Duration::from_millis(500),
            ..TransportConfig::default()
        },
    ));
    let forwarder = Forwarder::new(
        queue.clone(),
        transport,
        ForwarderConfig {
            target_chat_id: TARGET_CHAT,
            poll_timeout: Duration::from_millis(100),
        },
        Shutdown::new(),
    );

    assert!(!forwarder.forward(test_signal()).await);
    let outcome = pop_outcome(&queue).await;
    assert!(!outcome.success);
}

#[tokio::test]
async fn enabled_retry_reattempts_up_to_the_bound() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bottest-token/sendMessage"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let queue = Arc::new(MemoryQueue::new());
    let transport = Arc::new(TelegramTransport::with_config(
        server.uri(),
        "test-token",
        TransportConfig {
            max_retries: 2,
            retry_delays: vec![Duration::from_millis(10), Duration::from_millis(10)],
            ..TransportConfig::default()
        },
    ));
    let forwarder = Forwarder::new(
        queue.clone(),
        transport,
        ForwarderConfig {
            target_chat_id: TARGET_CHAT,
            poll_timeout: Duration::from_millis(100),
        },
        Shutdown::new(),
    );

    assert!(!forwarder.forward(test_signal()).await);
    // still exactly one outcome for the whole attempt sequence
    assert_eq!(queue.len(OUTCOME_QUEUE).await.unwrap(), 1);
}

#[tokio::test]
async fn malformed_parsed_entry_is_dropped_without_delivery() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bottest-token/sendMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(0)
        .mount(&server)
        .await;

    let queue = Arc::new(MemoryQueue::new());
    queue.enqueue(PARSED_QUEUE, "not json").await.unwrap();

    let shutdown = Shutdown::new();
    let transport = Arc::new(TelegramTransport::new(server.uri(), "test-token"));
    let forwarder = Forwarder::new(
        queue.clone(),
        transport,
        ForwarderConfig {
            target_chat_id: TARGET_CHAT,
            poll_timeout: Duration::from_millis(50),
        },
        shutdown.clone(),
    );

    let handle = tokio::spawn(async move { forwarder.run().await });
    tokio::time::sleep(Duration::from_millis(300)).await;
    shutdown.stop();
    tokio::time::timeout(Duration::from_secs(3), handle)
        .await
        .expect("forwarder did not honor shutdown")
        .unwrap();

    assert_eq!(queue.len(PARSED_QUEUE).await.unwrap(), 0);
    assert_eq!(queue.len(OUTCOME_QUEUE).await.unwrap(), 0);
}
