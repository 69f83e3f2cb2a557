//! SignalRelay Forwarder
//!
//! Consumes the parsed queue, delivers signals to the target chat through
//! the Telegram Bot API and appends an outcome record per signal.

use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;
use tokio::signal;
use tracing::{info, warn};

use sr_common::Shutdown;
use sr_forwarder::{Forwarder, ForwarderConfig, TelegramTransport};
use sr_queue::RedisQueue;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for local development)
    let _ = dotenvy::dotenv();

    sr_common::logging::init_logging("sr-forwarder");

    info!("Starting SignalRelay Forwarder");

    let redis_url = env_or("SIGNALRELAY_REDIS_URL", "redis://127.0.0.1:6379/0");
    let api_base = env_or("TELEGRAM_API_BASE", "https://api.telegram.org");
    let bot_token = std::env::var("TELEGRAM_BOT_TOKEN")
        .map_err(|_| anyhow::anyhow!("TELEGRAM_BOT_TOKEN is required"))?;
    let target_chat_id: i64 = env_or("SIGNALRELAY_TARGET_CHAT_ID", "-1002773853382")
        .parse()
        .map_err(|_| anyhow::anyhow!("SIGNALRELAY_TARGET_CHAT_ID must be an integer"))?;

    let queue = Arc::new(RedisQueue::connect(&redis_url).await?);
    info!(redis_url = %redis_url, "connected to queue store");

    let transport = Arc::new(TelegramTransport::new(api_base, bot_token));
    // Startup probe only: a failure here is logged, the loop still starts
    // and individual deliveries fail on their own.
    if let Err(e) = transport.check_connection().await {
        warn!(error = %e, "bot connection check failed");
    }

    let shutdown = Shutdown::new();
    let forwarder = Forwarder::new(
        queue,
        transport,
        ForwarderConfig {
            target_chat_id,
            ..ForwarderConfig::default()
        },
        shutdown.clone(),
    );

    let handle = tokio::spawn(async move { forwarder.run().await });

    info!(target_chat_id, "Forwarder started. Press Ctrl+C to shutdown.");
    shutdown_signal().await;
    info!("Shutdown signal received...");
    shutdown.stop();

    match tokio::time::timeout(Duration::from_secs(35), handle).await {
        Ok(_) => info!("Forwarder stopped"),
        Err(_) => warn!("Forwarder did not stop within timeout"),
    }

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
