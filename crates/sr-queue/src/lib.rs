use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

pub mod error;
pub mod memory;
pub mod redis;

pub use error::QueueError;
pub use memory::MemoryQueue;
pub use self::redis::RedisQueue;

pub type Result<T> = std::result::Result<T, QueueError>;

/// Raw inbound messages, pushed by the ingestion stage.
pub const RAW_QUEUE: &str = "telegram_messages";
/// Parsed signals, pushed by the parsing stage.
pub const PARSED_QUEUE: &str = "parsed_signals";
/// Forwarding outcome records, pushed by the forwarding stage.
pub const OUTCOME_QUEUE: &str = "forwarding_logs";

/// Contract every stage uses against the queue store.
///
/// The producer always pushes to one end and the consumer blocking-pops from
/// the other, so a single producer/consumer pair sees strict FIFO order.
/// `dequeue_blocking` removes the entry atomically with its return: a crash
/// between pop and the consumer's side effect loses the entry. Each hop is
/// at-most-once, never duplicated.
#[async_trait]
pub trait SignalQueue: Send + Sync {
    /// Push a payload to the producer end. Never blocks. Fails with
    /// [`QueueError::Unavailable`] when the store cannot be reached, in
    /// which case the payload must not be assumed durably recorded.
    async fn enqueue(&self, queue: &str, payload: &str) -> Result<()>;

    /// Block up to `timeout` for an entry. `Ok(None)` on timeout is not an
    /// error; it is the caller's cancellation checkpoint.
    async fn dequeue_blocking(&self, queue: &str, timeout: Duration) -> Result<Option<String>>;

    /// Point-in-time depth. Reporting only, never flow control.
    async fn len(&self, queue: &str) -> Result<u64>;

    /// Most recent `count` payloads from the producer end, newest first.
    /// Does not consume. Used by the status gateway for recent activity.
    async fn peek_recent(&self, queue: &str, count: usize) -> Result<Vec<String>>;

    /// Reachability probe for the health surface.
    async fn ping(&self) -> Result<()>;
}

/// Serialize `value` and enqueue it.
pub async fn enqueue_json<T: Serialize + Sync>(
    queue: &dyn SignalQueue,
    name: &str,
    value: &T,
) -> Result<()> {
    let payload = serde_json::to_string(value)?;
    queue.enqueue(name, &payload).await
}

/// Blocking-pop and decode one entry.
///
/// A malformed payload yields [`QueueError::Decode`]; the entry is already
/// removed from the queue at that point, so the caller logs and drops it
/// rather than requeueing a poison message.
pub async fn dequeue_json<T: DeserializeOwned>(
    queue: &dyn SignalQueue,
    name: &str,
    timeout: Duration,
) -> Result<Option<T>> {
    match queue.dequeue_blocking(name, timeout).await? {
        Some(payload) => serde_json::from_str(&payload)
            .map(Some)
            .map_err(|e| QueueError::Decode(e.to_string())),
        None => Ok(None),
    }
}
