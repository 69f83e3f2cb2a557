//! In-process queue store
//!
//! Same contract as the Redis backend, backed by per-name deques. Used by
//! the test suites and by single-process development setups. Supports a
//! switchable unavailable mode so store-outage handling is testable.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::{QueueError, Result, SignalQueue};

pub struct MemoryQueue {
    queues: Mutex<HashMap<String, VecDeque<String>>>,
    notify: Notify,
    available: AtomicBool,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            notify: Notify::new(),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate a store outage (`false`) or restore reachability (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(QueueError::Unavailable("store marked unavailable".to_string()))
        }
    }

    fn pop(&self, queue: &str) -> Option<String> {
        self.queues.lock().get_mut(queue).and_then(|q| q.pop_back())
    }
}

#[async_trait]
impl SignalQueue for MemoryQueue {
    async fn enqueue(&self, queue: &str, payload: &str) -> Result<()> {
        self.check_available()?;
        self.queues
            .lock()
            .entry(queue.to_string())
            .or_default()
            .push_front(payload.to_string());
        self.notify.notify_waiters();
        Ok(())
    }

    async fn dequeue_blocking(&self, queue: &str, timeout: Duration) -> Result<Option<String>> {
        let deadline = Instant::now() + timeout;
        loop {
            self.check_available()?;

            // Register for wakeups before checking, so a push between the
            // check and the wait is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(payload) = self.pop(queue) {
                return Ok(Some(payload));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep(remaining) => return Ok(None),
            }
        }
    }

    async fn len(&self, queue: &str) -> Result<u64> {
        self.check_available()?;
        Ok(self
            .queues
            .lock()
            .get(queue)
            .map(|q| q.len() as u64)
            .unwrap_or(0))
    }

    async fn peek_recent(&self, queue: &str, count: usize) -> Result<Vec<String>> {
        self.check_available()?;
        Ok(self
            .queues
            .lock()
            .get(queue)
            .map(|q| q.iter().take(count).cloned().collect())
            .unwrap_or_default())
    }

    async fn ping(&self) -> Result<()> {
        self.check_available()
    }
}
