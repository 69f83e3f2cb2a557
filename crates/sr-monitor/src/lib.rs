//! Pipeline health watchdog
//!
//! Polls the status gateway's health endpoint on a fixed interval and keeps
//! a consecutive-failure counter, reset on any success. At the configured
//! threshold it fires a restart action against the process supervisor, then
//! backs off for a cool-down window (a longer one when the restart itself
//! fails) before polling again. This runs as its own process, outside the
//! pipeline's failure handling.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use sr_common::Shutdown;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("restart command failed: {0}")]
    Restart(String),

    #[error("restart command could not be spawned: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Health endpoint of the status gateway.
    pub health_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    /// Consecutive failed checks before a restart is issued.
    pub failure_threshold: u32,
    /// Pause after a successful restart.
    pub restart_cooldown: Duration,
    /// Longer pause after a failed restart before trying again.
    pub restart_failure_cooldown: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            health_url: "http://localhost:8080/health".to_string(),
            poll_interval: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
            failure_threshold: 3,
            restart_cooldown: Duration::from_secs(60),
            restart_failure_cooldown: Duration::from_secs(120),
        }
    }
}

/// Escalation seam to the process supervisor.
#[async_trait]
pub trait RestartAction: Send + Sync {
    async fn restart(&self) -> Result<(), MonitorError>;
}

/// Runs a supervisor command (e.g. `docker-compose restart`).
pub struct CommandRestart {
    program: String,
    args: Vec<String>,
}

impl CommandRestart {
    /// Build from a whitespace-separated command line.
    pub fn from_command_line(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(String::from);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

#[async_trait]
impl RestartAction for CommandRestart {
    async fn restart(&self) -> Result<(), MonitorError> {
        info!(program = %self.program, "issuing restart command");
        let output = Command::new(&self.program).args(&self.args).output().await?;

        if output.status.success() {
            Ok(())
        } else {
            Err(MonitorError::Restart(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }
}

pub struct Monitor {
    config: MonitorConfig,
    client: reqwest::Client,
    action: Arc<dyn RestartAction>,
    shutdown: Shutdown,
    failed_checks: AtomicU32,
}

impl Monitor {
    pub fn new(config: MonitorConfig, action: Arc<dyn RestartAction>, shutdown: Shutdown) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("failed to build HTTP client");

        Self {
            config,
            client,
            action,
            shutdown,
            failed_checks: AtomicU32::new(0),
        }
    }

    pub fn failed_checks(&self) -> u32 {
        self.failed_checks.load(Ordering::SeqCst)
    }

    async fn check_health(&self) -> bool {
        match self.client.get(&self.config.health_url).send().await {
            Ok(response) => {
                let healthy = response.status().is_success();
                if !healthy {
                    warn!(status = response.status().as_u16(), "health check failed");
                }
                healthy
            }
            Err(e) => {
                warn!(error = %e, "health check unreachable");
                false
            }
        }
    }

    /// One poll step: check, count, escalate at the threshold. Returns how
    /// long to wait before the next step.
    pub async fn tick(&self) -> Duration {
        if self.check_health().await {
            self.failed_checks.store(0, Ordering::SeqCst);
            debug!("pipeline healthy");
            return self.config.poll_interval;
        }

        let failed = self.failed_checks.fetch_add(1, Ordering::SeqCst) + 1;
        warn!(
            failed,
            threshold = self.config.failure_threshold,
            "consecutive health check failure"
        );

        if failed < self.config.failure_threshold {
            return self.config.poll_interval;
        }

        error!(failed, "failure threshold reached, escalating to restart");
        match self.action.restart().await {
            Ok(()) => {
                info!("pipeline restarted");
                self.failed_checks.store(0, Ordering::SeqCst);
                self.config.restart_cooldown
            }
            Err(e) => {
                error!(error = %e, "restart failed");
                self.config.restart_failure_cooldown
            }
        }
    }

    /// Poll until the shutdown flag is set.
    pub async fn run(&self) {
        info!(
            url = %self.config.health_url,
            interval_secs = self.config.poll_interval.as_secs(),
            threshold = self.config.failure_threshold,
            "health monitor started"
        );

        while !self.shutdown.is_stopped() {
            let delay = self.tick().await;
            tokio::time::sleep(delay).await;
        }

        info!("health monitor stopped");
    }
}
