//! Status Gateway HTTP API
//!
//! Read-only aggregated pipeline state, queried live from the queue store
//! on every request (no caching):
//! - Store reachability health
//! - Per-queue depths and recent forwarding outcomes
//! - Flat metrics snapshot
//! - Diagnostic signal injection and a synchronous processing path

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use sr_common::{RawMessage, SourceKind};
use sr_forwarder::Transport;
use sr_parser::{format_signal, SignalDetector};
use sr_queue::{enqueue_json, QueueError, SignalQueue, OUTCOME_QUEUE, PARSED_QUEUE, RAW_QUEUE};

/// How many recent outcome records /services reports.
const RECENT_ACTIVITY_LIMIT: usize = 5;

/// Canned full signal used by the diagnostic injection endpoint.
const TEST_SIGNAL_TEXT: &str = "🟢 Long\nName: BTC/USDT\nMargin mode: Cross (10.0X)\n\n↪️ Entry price(USDT):\n45000.0\n\nTargets(USDT):\n1) 45500.0\n2) 46000.0\n3) 46500.0";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<dyn SignalQueue>,
    pub transport: Arc<dyn Transport>,
    pub detector: Arc<SignalDetector>,
    pub target_chat_id: i64,
}

// ============================================================================
// Response Models
// ============================================================================

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// "healthy" or "unhealthy"
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub services: ServicesHealth,
}

#[derive(Serialize, ToSchema)]
pub struct ServicesHealth {
    /// Queue store reachability
    pub store: String,
    /// The gateway itself (always healthy when it can answer)
    pub gateway: String,
}

#[derive(Serialize, ToSchema)]
pub struct ServiceStatusResponse {
    pub services: ServicesOverview,
    pub queues: QueueDepths,
    #[schema(value_type = Vec<Object>)]
    pub recent_activity: Vec<serde_json::Value>,
}

#[derive(Serialize, ToSchema)]
pub struct ServicesOverview {
    #[serde(rename = "telegram-receiver")]
    pub telegram_receiver: ServiceEntry,
    #[serde(rename = "signal-parser")]
    pub signal_parser: ServiceEntry,
    #[serde(rename = "signal-forwarder")]
    pub signal_forwarder: ServiceEntry,
}

#[derive(Serialize, ToSchema)]
pub struct ServiceEntry {
    pub status: String,
    pub description: String,
    /// Depth of the queue this service consumes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_size: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct QueueDepths {
    pub raw: u64,
    pub parsed: u64,
}

#[derive(Serialize, ToSchema)]
pub struct MetricsResponse {
    pub queue_telegram_messages: u64,
    pub queue_parsed_signals: u64,
    pub total_forwarded_signals: u64,
    pub system_healthy: u8,
}

#[derive(Serialize, ToSchema)]
pub struct TestSignalResponse {
    pub success: bool,
    pub message: String,
    pub signal: RawMessage,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SignalRequest {
    pub text: String,
    #[serde(default)]
    pub chat_id: i64,
}

#[derive(Serialize, ToSchema)]
pub struct SignalResponse {
    /// "forwarded", "ignored" or "delivery_failed"
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

// ============================================================================
// Error Mapping
// ============================================================================

/// Store unavailability surfaces as 503, everything else as 500. Neither
/// exposes more than the error message.
pub enum ApiError {
    Store(String),
    Internal(String),
}

impl From<QueueError> for ApiError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::Unavailable(m) => ApiError::Store(m),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::Store(m) => (StatusCode::SERVICE_UNAVAILABLE, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Queue-store reachability check
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Store reachable", body = HealthResponse),
        (status = 503, description = "Store unreachable", body = HealthResponse)
    )
)]
async fn health_handler(State(state): State<AppState>) -> Response {
    match state.queue.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy".to_string(),
                timestamp: Utc::now(),
                services: ServicesHealth {
                    store: "healthy".to_string(),
                    gateway: "healthy".to_string(),
                },
            }),
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "queue store unreachable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy".to_string(),
                    timestamp: Utc::now(),
                    services: ServicesHealth {
                        store: "unhealthy".to_string(),
                        gateway: "healthy".to_string(),
                    },
                }),
            )
                .into_response()
        }
    }
}

/// Per-queue depths and recent forwarding activity
#[utoipa::path(
    get,
    path = "/services",
    tag = "status",
    responses(
        (status = 200, description = "Service overview", body = ServiceStatusResponse),
        (status = 503, description = "Store unreachable", body = ErrorBody)
    )
)]
async fn services_handler(
    State(state): State<AppState>,
) -> Result<Json<ServiceStatusResponse>, ApiError> {
    let raw_depth = state.queue.len(RAW_QUEUE).await?;
    let parsed_depth = state.queue.len(PARSED_QUEUE).await?;
    let recent = state
        .queue
        .peek_recent(OUTCOME_QUEUE, RECENT_ACTIVITY_LIMIT)
        .await?;

    // undecodable records are reported as empty objects, not dropped
    let recent_activity = recent
        .iter()
        .map(|payload| serde_json::from_str(payload).unwrap_or_else(|_| serde_json::json!({})))
        .collect();

    Ok(Json(ServiceStatusResponse {
        services: ServicesOverview {
            telegram_receiver: ServiceEntry {
                status: "running".to_string(),
                description: "Receives messages from monitored chats".to_string(),
                queue_size: None,
            },
            signal_parser: ServiceEntry {
                status: "running".to_string(),
                description: "Parses received messages into signals".to_string(),
                queue_size: Some(raw_depth),
            },
            signal_forwarder: ServiceEntry {
                status: "running".to_string(),
                description: "Forwards parsed signals to the target chat".to_string(),
                queue_size: Some(parsed_depth),
            },
        },
        queues: QueueDepths {
            raw: raw_depth,
            parsed: parsed_depth,
        },
        recent_activity,
    }))
}

/// Flat numeric snapshot for monitoring
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "status",
    responses(
        (status = 200, description = "Metrics snapshot", body = MetricsResponse),
        (status = 503, description = "Store unreachable", body = ErrorBody)
    )
)]
async fn metrics_handler(State(state): State<AppState>) -> Result<Json<MetricsResponse>, ApiError> {
    let raw_depth = state.queue.len(RAW_QUEUE).await?;
    let parsed_depth = state.queue.len(PARSED_QUEUE).await?;
    let outcome_count = state.queue.len(OUTCOME_QUEUE).await?;

    Ok(Json(MetricsResponse {
        queue_telegram_messages: raw_depth,
        queue_parsed_signals: parsed_depth,
        total_forwarded_signals: outcome_count,
        system_healthy: 1,
    }))
}

/// Inject a canned test signal into the raw queue
#[utoipa::path(
    post,
    path = "/test/signal",
    tag = "diagnostics",
    responses(
        (status = 200, description = "Signal injected", body = TestSignalResponse),
        (status = 503, description = "Store unreachable", body = ErrorBody)
    )
)]
async fn test_signal_handler(
    State(state): State<AppState>,
) -> Result<Json<TestSignalResponse>, ApiError> {
    let signal = RawMessage {
        text: TEST_SIGNAL_TEXT.to_string(),
        chat_id: -1002299206473,
        message_id: 99999,
        sender_id: 12345,
        timestamp: Utc::now(),
        source: SourceKind::TestInjection,
    };

    enqueue_json(state.queue.as_ref(), RAW_QUEUE, &signal).await?;

    Ok(Json(TestSignalResponse {
        success: true,
        message: "Test signal injected into queue".to_string(),
        signal,
    }))
}

/// Process a single message synchronously, bypassing the queue
#[utoipa::path(
    post,
    path = "/signal",
    tag = "diagnostics",
    request_body = SignalRequest,
    responses(
        (status = 200, description = "Processing result", body = SignalResponse)
    )
)]
async fn signal_handler(
    State(state): State<AppState>,
    Json(request): Json<SignalRequest>,
) -> Result<Json<SignalResponse>, ApiError> {
    let detector = &state.detector;
    tracing::debug!(chat_id = request.chat_id, "processing synchronous signal");

    if !detector.is_signal(&request.text) {
        return Ok(Json(SignalResponse {
            status: "ignored".to_string(),
            order_id: None,
        }));
    }

    let text = if detector.is_trading_update(&request.text) {
        request.text.clone()
    } else {
        match detector.parse_signal(&request.text) {
            Some(data) => format_signal(&data),
            None => {
                return Ok(Json(SignalResponse {
                    status: "ignored".to_string(),
                    order_id: None,
                }))
            }
        }
    };

    let delivery = state.transport.deliver(state.target_chat_id, &text).await;
    let status = if delivery.success {
        "forwarded"
    } else {
        warn!(
            status = delivery.status_code,
            error = delivery.error_message.as_deref().unwrap_or("?"),
            "synchronous delivery failed"
        );
        "delivery_failed"
    };

    Ok(Json(SignalResponse {
        status: status.to_string(),
        order_id: None,
    }))
}

// ============================================================================
// Router
// ============================================================================

#[derive(OpenApi)]
#[openapi(
    info(
        title = "SignalRelay Status Gateway",
        version = "0.1.0",
        description = "Read-only pipeline status, metrics and diagnostics"
    ),
    paths(
        health_handler,
        services_handler,
        metrics_handler,
        test_signal_handler,
        signal_handler,
    ),
    components(schemas(
        HealthResponse,
        ServicesHealth,
        ServiceStatusResponse,
        ServicesOverview,
        ServiceEntry,
        QueueDepths,
        MetricsResponse,
        TestSignalResponse,
        SignalRequest,
        SignalResponse,
        ErrorBody,
    ))
)]
struct ApiDoc;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/services", get(services_handler))
        .route("/metrics", get(metrics_handler))
        .route("/test/signal", post(test_signal_handler))
        .route("/signal", post(signal_handler))
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
