//! SignalRelay Parser
//!
//! Consumes the raw queue, recognizes trading signals and pushes parsed
//! signals onto the parsed queue.

use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;
use tokio::signal;
use tracing::{info, warn};

use sr_common::Shutdown;
use sr_parser::Parser;
use sr_queue::RedisQueue;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for local development)
    let _ = dotenvy::dotenv();

    sr_common::logging::init_logging("sr-parser");

    info!("Starting SignalRelay Parser");

    let redis_url = std::env::var("SIGNALRELAY_REDIS_URL")
        .unwrap_or_else(|_| "redis://127.0.0.1:6379/0".to_string());

    let queue = Arc::new(RedisQueue::connect(&redis_url).await?);
    info!(redis_url = %redis_url, "connected to queue store");

    let shutdown = Shutdown::new();
    let parser = Parser::new(queue, shutdown.clone());

    let handle = tokio::spawn(async move { parser.run().await });

    info!("Parser started. Press Ctrl+C to shutdown.");
    shutdown_signal().await;
    info!("Shutdown signal received...");
    shutdown.stop();

    match tokio::time::timeout(Duration::from_secs(5), handle).await {
        Ok(_) => info!("Parser stopped"),
        Err(_) => warn!("Parser did not stop within timeout"),
    }

    Ok(())
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
