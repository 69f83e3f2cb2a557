//! Forwarding stage
//!
//! Consumes the parsed queue with a timeout-bounded blocking pop, delivers
//! each signal through the outbound transport and appends exactly one
//! outcome record per dequeued signal. The pop removes the entry before
//! delivery starts, so this hop is at-most-once: a crash between pop and
//! delivery loses that signal, it is never delivered twice.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use sr_common::{ForwardingOutcome, ParsedSignal, Shutdown};
use sr_queue::{dequeue_json, enqueue_json, QueueError, SignalQueue, OUTCOME_QUEUE, PARSED_QUEUE};

pub mod transport;

pub use transport::{DeliveryOutcome, TelegramTransport, Transport, TransportConfig};

#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("transport request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    /// Destination chat for every forwarded signal.
    pub target_chat_id: i64,
    pub poll_timeout: Duration,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            target_chat_id: -1002773853382,
            poll_timeout: Duration::from_secs(1),
        }
    }
}

pub struct Forwarder {
    queue: Arc<dyn SignalQueue>,
    transport: Arc<dyn Transport>,
    config: ForwarderConfig,
    shutdown: Shutdown,
}

impl Forwarder {
    pub fn new(
        queue: Arc<dyn SignalQueue>,
        transport: Arc<dyn Transport>,
        config: ForwarderConfig,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            queue,
            transport,
            config,
            shutdown,
        }
    }

    /// Deliver one signal and record its outcome. Exactly one delivery
    /// attempt sequence and at most one outcome record per call.
    pub async fn forward(&self, signal: ParsedSignal) -> bool {
        info!(
            kind = ?signal.kind,
            source_chat_id = signal.source_chat_id,
            "forwarding signal"
        );

        let delivery = self
            .transport
            .deliver(self.config.target_chat_id, &signal.formatted_text)
            .await;

        if delivery.success {
            info!(target_chat_id = self.config.target_chat_id, "signal forwarded");
        } else {
            warn!(
                status = delivery.status_code,
                error = delivery.error_message.as_deref().unwrap_or("?"),
                "signal forwarding failed"
            );
        }

        let record = ForwardingOutcome::new(&signal, self.config.target_chat_id, delivery.success);
        // Best-effort append: a failure here is logged, never retried, and
        // does not roll back the delivery.
        if let Err(e) = enqueue_json(self.queue.as_ref(), OUTCOME_QUEUE, &record).await {
            warn!(error = %e, "failed to record forwarding outcome");
        }

        delivery.success
    }

    /// Run until the shutdown flag is set. The 1 s pop timeout is the only
    /// suspension point besides the outbound call itself.
    pub async fn run(&self) {
        info!(
            target_chat_id = self.config.target_chat_id,
            "signal forwarder started"
        );

        while !self.shutdown.is_stopped() {
            match dequeue_json::<ParsedSignal>(
                self.queue.as_ref(),
                PARSED_QUEUE,
                self.config.poll_timeout,
            )
            .await
            {
                Ok(Some(signal)) => {
                    self.forward(signal).await;
                }
                Ok(None) => {}
                Err(QueueError::Decode(e)) => {
                    warn!(error = %e, "dropping malformed parsed signal");
                }
                Err(e) => {
                    warn!(error = %e, "parsed queue unavailable");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }

        info!("signal forwarder stopped");
    }
}
