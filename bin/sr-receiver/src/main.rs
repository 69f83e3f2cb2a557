//! SignalRelay Receiver
//!
//! Subscribes to the monitored chats, filters inbound messages against the
//! allowlist and pushes accepted messages onto the raw queue.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;
use tokio::signal;
use tracing::{error, info, warn};

use sr_common::Shutdown;
use sr_ingest::{Receiver, TelegramPollingSource};
use sr_queue::RedisQueue;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for local development)
    let _ = dotenvy::dotenv();

    sr_common::logging::init_logging("sr-receiver");

    info!("Starting SignalRelay Receiver");

    let redis_url = env_or("SIGNALRELAY_REDIS_URL", "redis://127.0.0.1:6379/0");
    let api_base = env_or("TELEGRAM_API_BASE", "https://api.telegram.org");
    let bot_token = std::env::var("TELEGRAM_BOT_TOKEN")
        .map_err(|_| anyhow::anyhow!("TELEGRAM_BOT_TOKEN is required"))?;

    let allowlist = load_allowlist();
    if allowlist.is_empty() {
        warn!("allowlist is empty, every inbound message will be discarded");
    }

    let queue = Arc::new(RedisQueue::connect(&redis_url).await?);
    info!(redis_url = %redis_url, "connected to queue store");

    let shutdown = Shutdown::new();
    let source = TelegramPollingSource::new(api_base, bot_token);
    let mut receiver = Receiver::new(Box::new(source), queue, allowlist, shutdown.clone());

    let handle = tokio::spawn(async move {
        if let Err(e) = receiver.run().await {
            error!(error = %e, "receiver terminated with error");
        }
    });

    info!("Receiver started. Press Ctrl+C to shutdown.");
    shutdown_signal().await;
    info!("Shutdown signal received...");
    shutdown.stop();

    // bounded by the long-poll window plus slack
    match tokio::time::timeout(Duration::from_secs(40), handle).await {
        Ok(_) => info!("Receiver stopped"),
        Err(_) => warn!("Receiver did not stop within timeout"),
    }

    Ok(())
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Comma-separated chat identifiers, e.g. "-1002299206473,-1001804143400"
fn load_allowlist() -> HashSet<i64> {
    env_or("SIGNALRELAY_ALLOWLIST", "-1002299206473,-1001804143400")
        .split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect()
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
