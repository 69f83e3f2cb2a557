//! SignalRelay Status Gateway
//!
//! Read-only HTTP surface over the queue store: health, queue depths,
//! recent forwarding activity and diagnostic endpoints.

use std::sync::Arc;
use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use sr_forwarder::TelegramTransport;
use sr_gateway::{create_router, AppState};
use sr_parser::SignalDetector;
use sr_queue::RedisQueue;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for local development)
    let _ = dotenvy::dotenv();

    sr_common::logging::init_logging("sr-gateway");

    info!("Starting SignalRelay Status Gateway");

    let redis_url = env_or("SIGNALRELAY_REDIS_URL", "redis://127.0.0.1:6379/0");
    let api_base = env_or("TELEGRAM_API_BASE", "https://api.telegram.org");
    let bot_token = std::env::var("TELEGRAM_BOT_TOKEN").unwrap_or_default();
    if bot_token.is_empty() {
        warn!("TELEGRAM_BOT_TOKEN not set, POST /signal deliveries will fail");
    }
    let target_chat_id: i64 = env_or("SIGNALRELAY_TARGET_CHAT_ID", "-1002773853382")
        .parse()
        .map_err(|_| anyhow::anyhow!("SIGNALRELAY_TARGET_CHAT_ID must be an integer"))?;
    let port: u16 = env_or("SIGNALRELAY_HTTP_PORT", "8080")
        .parse()
        .map_err(|_| anyhow::anyhow!("SIGNALRELAY_HTTP_PORT must be a port number"))?;

    let queue = Arc::new(RedisQueue::connect(&redis_url).await?);
    info!(redis_url = %redis_url, "connected to queue store");

    let state = AppState {
        queue,
        transport: Arc::new(TelegramTransport::new(api_base, bot_token)),
        detector: Arc::new(SignalDetector::new()),
        target_chat_id,
    };

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    info!(port, "Status Gateway listening");

    let server_task = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    info!("Gateway started. Press Ctrl+C to shutdown.");
    shutdown_signal().await;
    info!("Shutdown signal received...");

    server_task.abort();
    info!("Gateway stopped");

    Ok(())
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
