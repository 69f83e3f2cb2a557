//! SignalRelay Health Monitor
//!
//! External watchdog: polls the status gateway's health endpoint and
//! escalates to a supervisor restart after consecutive failures.

use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;
use tokio::signal;
use tracing::info;

use sr_common::Shutdown;
use sr_monitor::{CommandRestart, Monitor, MonitorConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for local development)
    let _ = dotenvy::dotenv();

    sr_common::logging::init_logging("sr-monitor");

    info!("Starting SignalRelay Health Monitor");

    let config = load_monitor_config();
    let restart_command = std::env::var("SIGNALRELAY_RESTART_COMMAND")
        .unwrap_or_else(|_| "docker-compose restart".to_string());
    let action = CommandRestart::from_command_line(&restart_command)
        .ok_or_else(|| anyhow::anyhow!("SIGNALRELAY_RESTART_COMMAND must not be empty"))?;

    let shutdown = Shutdown::new();
    let monitor = Monitor::new(config, Arc::new(action), shutdown.clone());

    let handle = tokio::spawn(async move { monitor.run().await });

    info!("Monitor started. Press Ctrl+C to shutdown.");
    shutdown_signal().await;
    info!("Shutdown signal received...");
    shutdown.stop();

    // the loop may be in a cool-down sleep; don't wait it out
    match tokio::time::timeout(Duration::from_secs(5), handle).await {
        Ok(_) => info!("Monitor stopped"),
        Err(_) => info!("Monitor stopping after current wait"),
    }

    Ok(())
}

fn load_monitor_config() -> MonitorConfig {
    let mut config = MonitorConfig::default();

    if let Ok(url) = std::env::var("SIGNALRELAY_HEALTH_URL") {
        config.health_url = url;
    }
    if let Some(interval) = env_secs("SIGNALRELAY_POLL_INTERVAL") {
        config.poll_interval = interval;
    }
    if let Ok(val) = std::env::var("SIGNALRELAY_FAILURE_THRESHOLD") {
        if let Ok(threshold) = val.parse() {
            config.failure_threshold = threshold;
        }
    }

    config
}

fn env_secs(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
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
