//! Message source client
//!
//! [`MessageSource`] is the seam to the external chat source. The concrete
//! implementation long-polls the Telegram Bot API; tests script their own.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{IngestError, Result};

/// One inbound event from a monitored chat.
#[derive(Debug, Clone)]
pub struct SourceEvent {
    pub text: String,
    pub chat_id: i64,
    pub message_id: i64,
    pub sender_id: i64,
    pub timestamp: DateTime<Utc>,
}

/// External message-source client.
#[async_trait]
pub trait MessageSource: Send {
    fn identifier(&self) -> &str;

    /// Establish the subscription. Called once before the event loop.
    async fn connect(&mut self) -> Result<()>;

    /// Wait for the next event. `Ok(None)` when no event arrived within the
    /// source's poll window; the caller loops and re-checks its stop flag.
    async fn next_event(&mut self) -> Result<Option<SourceEvent>>;
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

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<IncomingMessage>,
    channel_post: Option<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
struct IncomingMessage {
    message_id: i64,
    text: Option<String>,
    date: i64,
    chat: ChatRef,
    from: Option<UserRef>,
}

#[derive(Debug, Deserialize)]
struct ChatRef {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct UserRef {
    id: i64,
}

/// Telegram Bot API source using `getUpdates` long polling.
pub struct TelegramPollingSource {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
    poll_timeout: Duration,
    offset: Option<i64>,
    pending: VecDeque<SourceEvent>,
}

impl TelegramPollingSource {
    pub fn new(api_base: impl Into<String>, bot_token: impl Into<String>) -> Self {
        let poll_timeout = Duration::from_secs(25);
        let client = reqwest::Client::builder()
            // long poll plus slack for the response itself
            .timeout(poll_timeout + Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            api_base: api_base.into(),
            bot_token: bot_token.into(),
            poll_timeout,
            offset: None,
            pending: VecDeque::new(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }

    fn push_update(&mut self, update: Update) {
        let next_offset = update.update_id + 1;
        if self.offset.map(|o| next_offset > o).unwrap_or(true) {
            self.offset = Some(next_offset);
        }

        let Some(incoming) = update.message.or(update.channel_post) else {
            return;
        };
        let Some(text) = incoming.text else {
            debug!(message_id = incoming.message_id, "skipping non-text update");
            return;
        };

        self.pending.push_back(SourceEvent {
            text,
            chat_id: incoming.chat.id,
            message_id: incoming.message_id,
            sender_id: incoming.from.map(|u| u.id).unwrap_or(0),
            timestamp: DateTime::from_timestamp(incoming.date, 0).unwrap_or_else(Utc::now),
        });
    }
}

#[async_trait]
impl MessageSource for TelegramPollingSource {
    fn identifier(&self) -> &str {
        "telegram"
    }

    async fn connect(&mut self) -> Result<()> {
        let response = self.client.get(self.method_url("getMe")).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Source(format!(
                "bot connection failed: HTTP {}",
                status
            )));
        }

        let body: ApiResponse<BotInfo> = response.json().await?;
        if !body.ok {
            return Err(IngestError::Source(
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

    async fn next_event(&mut self) -> Result<Option<SourceEvent>> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(Some(event));
        }

        let mut request = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&[("timeout", self.poll_timeout.as_secs())]);
        if let Some(offset) = self.offset {
            request = request.query(&[("offset", offset)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Source(format!(
                "getUpdates failed: HTTP {}",
                status
            )));
        }

        let body: ApiResponse<Vec<Update>> = response.json().await?;
        if !body.ok {
            warn!(
                description = body.description.as_deref().unwrap_or("?"),
                "getUpdates returned ok=false"
            );
            return Ok(None);
        }

        for update in body.result.unwrap_or_default() {
            self.push_update(update);
        }
        Ok(self.pending.pop_front())
    }
}
