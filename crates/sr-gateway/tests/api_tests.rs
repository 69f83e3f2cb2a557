//! Status Gateway API Tests
//!
//! Runs the router on an ephemeral port and exercises it over HTTP:
//! - /health status flip with store availability
//! - /services depths and recent activity
//! - /metrics snapshot
//! - /test/signal injection
//! - /signal synchronous processing

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use sr_common::{ForwardingOutcome, ParsedSignal, RawMessage, SignalKind, SourceKind};
use sr_forwarder::{DeliveryOutcome, Transport};
use sr_gateway::{create_router, AppState};
use sr_parser::SignalDetector;
use sr_queue::{enqueue_json, MemoryQueue, SignalQueue, OUTCOME_QUEUE, PARSED_QUEUE, RAW_QUEUE};

const TARGET_CHAT: i64 = -1002773853382;

/// Transport stub that records deliveries instead of making requests.
struct RecordingTransport {
    delivered: parking_lot::Mutex<Vec<(i64, String)>>,
    succeed: bool,
}

impl RecordingTransport {
    fn new(succeed: bool) -> Self {
        Self {
            delivered: parking_lot::Mutex::new(Vec::new()),
            succeed,
        }
    }

    fn delivered(&self) -> Vec<(i64, String)> {
        self.delivered.lock().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn deliver(&self, chat_id: i64, text: &str) -> DeliveryOutcome {
        self.delivered.lock().push((chat_id, text.to_string()));
        if self.succeed {
            DeliveryOutcome::success(200)
        } else {
            DeliveryOutcome::failure(Some(500), "rejected".to_string())
        }
    }
}

async fn spawn_gateway(queue: Arc<MemoryQueue>, transport: Arc<RecordingTransport>) -> String {
    let state = AppState {
        queue,
        transport,
        detector: Arc::new(SignalDetector::new()),
        target_chat_id: TARGET_CHAT,
    };
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

fn sample_outcome(success: bool) -> ForwardingOutcome {
    let raw = RawMessage {
        text: "BTC/USDT Target #1 Done ✅".to_string(),
        chat_id: -1002299206473,
        message_id: 1,
        sender_id: 1,
        timestamp: "2025-08-24T12:00:00Z".parse().unwrap(),
        source: SourceKind::Test,
    };
    let signal = ParsedSignal {
        kind: SignalKind::TradingUpdate,
        original_text: raw.text.clone(),
        formatted_text: raw.text.clone(),
        parsed_data: None,
        source_chat_id: raw.chat_id,
        metadata: serde_json::to_value(&raw).unwrap(),
    };
    ForwardingOutcome::new(&signal, TARGET_CHAT, success)
}

#[tokio::test]
async fn health_flips_with_store_availability() {
    let queue = Arc::new(MemoryQueue::new());
    let base = spawn_gateway(queue.clone(), Arc::new(RecordingTransport::new(true))).await;

    let response = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["services"]["store"], "healthy");
    assert_eq!(body["services"]["gateway"], "healthy");

    queue.set_available(false);
    let response = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(response.status(), 503);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["services"]["store"], "unhealthy");

    queue.set_available(true);
    let response = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn health_is_idempotent_without_state_change() {
    let queue = Arc::new(MemoryQueue::new());
    let base = spawn_gateway(queue, Arc::new(RecordingTransport::new(true))).await;

    let first = reqwest::get(format!("{base}/health")).await.unwrap();
    let first_status = first.status();
    let first_body: serde_json::Value = first.json().await.unwrap();

    let second = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(second.status(), first_status);
    let second_body: serde_json::Value = second.json().await.unwrap();
    assert_eq!(second_body["status"], first_body["status"]);
    assert_eq!(second_body["services"], first_body["services"]);
}

#[tokio::test]
async fn metrics_reports_live_depths() {
    let queue = Arc::new(MemoryQueue::new());
    queue.enqueue(RAW_QUEUE, "{}").await.unwrap();
    queue.enqueue(RAW_QUEUE, "{}").await.unwrap();
    queue.enqueue(PARSED_QUEUE, "{}").await.unwrap();
    enqueue_json(queue.as_ref(), OUTCOME_QUEUE, &sample_outcome(true))
        .await
        .unwrap();

    let base = spawn_gateway(queue, Arc::new(RecordingTransport::new(true))).await;
    let body: serde_json::Value = reqwest::get(format!("{base}/metrics"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["queue_telegram_messages"], 2);
    assert_eq!(body["queue_parsed_signals"], 1);
    assert_eq!(body["total_forwarded_signals"], 1);
    assert_eq!(body["system_healthy"], 1);
}

#[tokio::test]
async fn unreachable_store_maps_to_503_with_error_body() {
    let queue = Arc::new(MemoryQueue::new());
    queue.set_available(false);
    let base = spawn_gateway(queue, Arc::new(RecordingTransport::new(true))).await;

    let response = reqwest::get(format!("{base}/metrics")).await.unwrap();
    assert_eq!(response.status(), 503);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn services_reports_depths_and_recent_activity() {
    let queue = Arc::new(MemoryQueue::new());
    queue.enqueue(RAW_QUEUE, "{}").await.unwrap();
    enqueue_json(queue.as_ref(), OUTCOME_QUEUE, &sample_outcome(true))
        .await
        .unwrap();
    // an undecodable record shows up as an empty object
    queue.enqueue(OUTCOME_QUEUE, "garbage").await.unwrap();

    let base = spawn_gateway(queue, Arc::new(RecordingTransport::new(true))).await;
    let body: serde_json::Value = reqwest::get(format!("{base}/services"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["queues"]["raw"], 1);
    assert_eq!(body["queues"]["parsed"], 0);
    assert_eq!(body["services"]["signal-parser"]["queue_size"], 1);
    assert_eq!(body["services"]["telegram-receiver"]["status"], "running");

    let activity = body["recent_activity"].as_array().unwrap();
    assert_eq!(activity.len(), 2);
    // newest first: the garbage entry decodes to {}
    assert_eq!(activity[0], serde_json::json!({}));
    assert_eq!(activity[1]["action"], "signal_forwarded");
    assert_eq!(activity[1]["success"], true);
}

#[tokio::test]
async fn test_signal_injection_lands_on_the_raw_queue() {
    let queue = Arc::new(MemoryQueue::new());
    let base = spawn_gateway(queue.clone(), Arc::new(RecordingTransport::new(true))).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{base}/test/signal"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["signal"]["source"], "test_injection");

    assert_eq!(queue.len(RAW_QUEUE).await.unwrap(), 1);
    let queued: RawMessage =
        sr_queue::dequeue_json(queue.as_ref(), RAW_QUEUE, Duration::from_millis(100))
            .await
            .unwrap()
            .unwrap();
    assert_eq!(queued.source, SourceKind::TestInjection);
    assert_eq!(queued.chat_id, -1002299206473);
}

#[tokio::test]
async fn sync_signal_bypasses_the_queue() {
    let queue = Arc::new(MemoryQueue::new());
    let transport = Arc::new(RecordingTransport::new(true));
    let base = spawn_gateway(queue.clone(), transport.clone()).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{base}/signal"))
        .json(&serde_json::json!({"text": "BUY BTCUSDT 0.1", "chat_id": -1002299206473i64}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "forwarded");
    assert!(body.get("order_id").is_none());

    let delivered = transport.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].0, TARGET_CHAT);
    assert_eq!(delivered[0].1, "BUY BTCUSDT 0.1");

    // no queue was touched
    assert_eq!(queue.len(RAW_QUEUE).await.unwrap(), 0);
    assert_eq!(queue.len(PARSED_QUEUE).await.unwrap(), 0);
    assert_eq!(queue.len(OUTCOME_QUEUE).await.unwrap(), 0);
}

#[tokio::test]
async fn sync_non_signal_is_ignored_without_delivery() {
    let queue = Arc::new(MemoryQueue::new());
    let transport = Arc::new(RecordingTransport::new(true));
    let base = spawn_gateway(queue, transport.clone()).await;

    let client = reqwest::Client::new();
    let body: serde_json::Value = client
        .post(format!("{base}/signal"))
        .json(&serde_json::json!({"text": "good morning everyone"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "ignored");
    assert!(transport.delivered().is_empty());
}

#[tokio::test]
async fn sync_delivery_failure_is_reported_in_the_body() {
    let queue = Arc::new(MemoryQueue::new());
    let transport = Arc::new(RecordingTransport::new(false));
    let base = spawn_gateway(queue, transport.clone()).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{base}/signal"))
        .json(&serde_json::json!({"text": "BTC/USDT Target #1 Done ✅"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "delivery_failed");
    assert_eq!(transport.delivered().len(), 1);
}
