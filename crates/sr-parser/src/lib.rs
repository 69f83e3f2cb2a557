//! Parsing stage
//!
//! Consumes the raw queue, recognizes signals, and pushes [`ParsedSignal`]
//! records onto the parsed queue. Non-signals and unparseable messages are
//! dropped. The blocking pop removes an entry before it is processed, so
//! this hop is at-most-once: a crash mid-process loses that one message.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use sr_common::{ParsedSignal, RawMessage, Shutdown, SignalKind};
use sr_queue::{dequeue_json, enqueue_json, QueueError, SignalQueue, PARSED_QUEUE, RAW_QUEUE};

pub mod signal;

pub use signal::{format_signal, SignalDetector};

pub struct Parser {
    queue: Arc<dyn SignalQueue>,
    detector: SignalDetector,
    shutdown: Shutdown,
    poll_timeout: Duration,
}

impl Parser {
    pub fn new(queue: Arc<dyn SignalQueue>, shutdown: Shutdown) -> Self {
        Self {
            queue,
            detector: SignalDetector::new(),
            shutdown,
            poll_timeout: Duration::from_secs(1),
        }
    }

    /// Classify one raw message. Pure: no queue side effects.
    pub fn evaluate(&self, message: &RawMessage) -> Option<ParsedSignal> {
        let text = &message.text;

        if !self.detector.is_signal(text) {
            debug!(chat_id = message.chat_id, "not a signal, dropping");
            return None;
        }

        let metadata = serde_json::to_value(message).unwrap_or_default();

        if self.detector.is_trading_update(text) {
            return Some(ParsedSignal {
                kind: SignalKind::TradingUpdate,
                original_text: text.clone(),
                formatted_text: text.clone(),
                parsed_data: None,
                source_chat_id: message.chat_id,
                metadata,
            });
        }

        let data = self.detector.parse_signal(text)?;
        let formatted_text = format_signal(&data);
        Some(ParsedSignal {
            kind: SignalKind::FullSignal,
            original_text: text.clone(),
            formatted_text,
            parsed_data: Some(data),
            source_chat_id: message.chat_id,
            metadata,
        })
    }

    async fn process(&self, message: RawMessage) {
        let Some(parsed) = self.evaluate(&message) else {
            return;
        };

        match enqueue_json(self.queue.as_ref(), PARSED_QUEUE, &parsed).await {
            Ok(()) => info!(
                kind = ?parsed.kind,
                source_chat_id = parsed.source_chat_id,
                "signal parsed and queued"
            ),
            Err(e) => warn!(error = %e, "failed to queue parsed signal, dropping"),
        }
    }

    /// Run until the shutdown flag is set. The 1 s pop timeout is the
    /// cancellation checkpoint.
    pub async fn run(&self) {
        info!("signal parser started");

        while !self.shutdown.is_stopped() {
            match dequeue_json::<RawMessage>(self.queue.as_ref(), RAW_QUEUE, self.poll_timeout)
                .await
            {
                Ok(Some(message)) => self.process(message).await,
                Ok(None) => {}
                Err(QueueError::Decode(e)) => {
                    warn!(error = %e, "dropping malformed raw message");
                }
                Err(e) => {
                    warn!(error = %e, "raw queue unavailable");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }

        info!("signal parser stopped");
    }
}
