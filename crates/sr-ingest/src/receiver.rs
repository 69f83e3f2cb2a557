//! Ingestion stage
//!
//! Filters inbound source events against the chat allowlist, normalizes
//! accepted messages into [`RawMessage`] records and pushes them onto the
//! raw queue. An enqueue failure is logged and the message dropped; the
//! stage keeps no local buffer.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use sr_common::{RawMessage, Shutdown, SourceKind};
use sr_queue::{enqueue_json, SignalQueue, RAW_QUEUE};

use crate::source::{MessageSource, SourceEvent};
use crate::Result;

/// Receiver lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    Connecting,
    Subscribed,
    Filtering,
    Enqueuing,
    Stopped,
}

pub struct Receiver {
    source: Box<dyn MessageSource>,
    queue: Arc<dyn SignalQueue>,
    allowlist: HashSet<i64>,
    shutdown: Shutdown,
    state: ReceiverState,
}

impl Receiver {
    pub fn new(
        source: Box<dyn MessageSource>,
        queue: Arc<dyn SignalQueue>,
        allowlist: HashSet<i64>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            source,
            queue,
            allowlist,
            shutdown,
            state: ReceiverState::Connecting,
        }
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    fn transition(&mut self, next: ReceiverState) {
        debug!(from = ?self.state, to = ?next, "receiver state change");
        self.state = next;
    }

    /// Run until the shutdown flag is set or the source fails
    /// unrecoverably. Either way the terminal state is `Stopped`.
    pub async fn run(&mut self) -> Result<()> {
        self.transition(ReceiverState::Connecting);
        if let Err(e) = self.source.connect().await {
            error!(error = %e, source = self.source.identifier(), "source connection failed");
            self.transition(ReceiverState::Stopped);
            return Err(e);
        }

        self.transition(ReceiverState::Subscribed);
        info!(
            source = self.source.identifier(),
            monitored_chats = self.allowlist.len(),
            "receiver subscribed"
        );

        while !self.shutdown.is_stopped() {
            match self.source.next_event().await {
                Ok(Some(event)) => self.handle_event(event).await,
                Ok(None) => continue,
                Err(e) => {
                    error!(error = %e, "source subscription failed");
                    self.transition(ReceiverState::Stopped);
                    return Err(e);
                }
            }
        }

        self.transition(ReceiverState::Stopped);
        Ok(())
    }

    async fn handle_event(&mut self, event: SourceEvent) {
        self.transition(ReceiverState::Filtering);

        // Non-member chats are discarded silently: no side effect, no error.
        if !self.allowlist.contains(&event.chat_id) {
            debug!(chat_id = event.chat_id, "chat not in allowlist, discarding");
            self.transition(ReceiverState::Subscribed);
            return;
        }

        if event.text.is_empty() {
            self.transition(ReceiverState::Subscribed);
            return;
        }

        self.transition(ReceiverState::Enqueuing);
        let message = RawMessage {
            text: event.text,
            chat_id: event.chat_id,
            message_id: event.message_id,
            sender_id: event.sender_id,
            timestamp: event.timestamp,
            source: SourceKind::TelegramReceiver,
        };

        match enqueue_json(self.queue.as_ref(), RAW_QUEUE, &message).await {
            Ok(()) => {
                info!(
                    chat_id = message.chat_id,
                    message_id = message.message_id,
                    "message queued"
                );
            }
            Err(e) => {
                // No local retry or buffering: the message is dropped.
                warn!(
                    error = %e,
                    chat_id = message.chat_id,
                    "failed to enqueue message, dropping"
                );
            }
        }

        self.transition(ReceiverState::Subscribed);
    }
}
