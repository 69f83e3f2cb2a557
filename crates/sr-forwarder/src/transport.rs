//! Outbound delivery transport
//!
//! [`Transport`] is the seam to the destination messaging API. The concrete
//! implementation POSTs to the Telegram Bot API; a delivery counts as
//! successful only on a 2xx acknowledgement. A request timeout is a
//! delivery failure, not a hang.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::ForwardError;

/// Result of one delivery attempt sequence.
#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    pub success: bool,
    pub status_code: Option<u16>,
    pub error_message: Option<String>,
}

impl DeliveryOutcome {
    pub fn success(status_code: u16) -> Self {
        Self {
            success: true,
            status_code: Some(status_code),
            error_message: None,
        }
    }

    pub fn failure(status_code: Option<u16>, message: String) -> Self {
        Self {
            success: false,
            status_code,
            error_message: Some(message),
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, chat_id: i64, text: &str) -> DeliveryOutcome;
}

/// Configuration for the Telegram transport.
///
/// `max_retries = 0` is the baseline: one attempt per message, failures are
/// recorded and the loop moves on. Raising it opts into bounded retry with
/// the given delay schedule, which shifts the stage toward at-least-once
/// delivery.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_retries: u32,
    pub retry_delays: Vec<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_retries: 0,
            retry_delays: vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(3),
            ],
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BotInfo {
    username: Option<String>,
    first_name: Option<String>,
}

/// Telegram Bot API transport (`sendMessage`).
pub struct TelegramTransport {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
    config: TransportConfig,
}

impl TelegramTransport {
    pub fn new(api_base: impl Into<String>, bot_token: impl Into<String>) -> Self {
        Self::with_config(api_base, bot_token, TransportConfig::default())
    }

    pub fn with_config(
        api_base: impl Into<String>,
        bot_token: impl Into<String>,
        config: TransportConfig,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            api_base: api_base.into(),
            bot_token: bot_token.into(),
            config,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }

    /// Startup probe against `getMe`, mirroring the receiver's connect.
    pub async fn check_connection(&self) -> Result<(), ForwardError> {
        let response = self.client.get(self.method_url("getMe")).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ForwardError::Transport(format!(
                "bot connection failed: HTTP {}",
                status
            )));
        }

        let body: ApiResponse<BotInfo> = response.json().await?;
        if !body.ok {
            return Err(ForwardError::Transport(
                body.description.unwrap_or_else(|| "getMe returned ok=false".to_string()),
            ));
        }

        let bot = body.result.unwrap_or(BotInfo { username: None, first_name: None });
        info!(
            username = bot.username.as_deref().unwrap_or("?"),
            name = bot.first_name.as_deref().unwrap_or("?"),
            "bot connected"
        );
        Ok(())
    }

    async fn deliver_once(&self, chat_id: i64, text: &str) -> DeliveryOutcome {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown",
            "disable_web_page_preview": true,
        });

        match self
            .client
            .post(self.method_url("sendMessage"))
            .json(&body)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                DeliveryOutcome::success(response.status().as_u16())
            }
            Ok(response) => {
                let status = response.status().as_u16();
                let error_text = response.text().await.unwrap_or_default();
                warn!(status, error = %error_text, "delivery rejected");
                DeliveryOutcome::failure(Some(status), error_text)
            }
            Err(e) => {
                warn!(error = %e, "delivery request failed");
                DeliveryOutcome::failure(None, e.to_string())
            }
        }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn deliver(&self, chat_id: i64, text: &str) -> DeliveryOutcome {
        let mut outcome = self.deliver_once(chat_id, text).await;

        let mut attempt = 0;
        while !outcome.success && attempt < self.config.max_retries {
            let delay = self
                .config
                .retry_delays
                .get(attempt as usize)
                .or(self.config.retry_delays.last())
                .copied()
                .unwrap_or(Duration::from_secs(1));
            debug!(attempt = attempt + 1, ?delay, "retrying delivery");
            tokio::time::sleep(delay).await;

            outcome = self.deliver_once(chat_id, text).await;
            attempt += 1;
        }

        outcome
    }
}
