//! Redis-backed queue store
//!
//! Each queue is a Redis list: producers LPUSH, consumers BRPOP with a
//! timeout, depth via LLEN. The connection is opened once per process and
//! reused through a [`ConnectionManager`], which reconnects on its own.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::debug;

use crate::{QueueError, Result, SignalQueue};

pub struct RedisQueue {
    conn: ConnectionManager,
}

impl RedisQueue {
    /// Connect to the queue store at `url` (e.g. `redis://127.0.0.1:6379/0`).
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;
        let conn = ConnectionManager::new(client).await?;
        debug!(url, "connected to queue store");
        Ok(Self { conn })
    }
}

#[async_trait]
impl SignalQueue for RedisQueue {
    async fn enqueue(&self, queue: &str, payload: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.lpush(queue, payload).await?;
        Ok(())
    }

    async fn dequeue_blocking(&self, queue: &str, timeout: Duration) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        // BRPOP returns (key, payload) or nil on timeout
        let entry: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(queue)
            .arg(timeout.as_secs_f64())
            .query_async(&mut conn)
            .await?;
        Ok(entry.map(|(_, payload)| payload))
    }

    async fn len(&self, queue: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        let depth: u64 = conn.llen(queue).await?;
        Ok(depth)
    }

    async fn peek_recent(&self, queue: &str, count: usize) -> Result<Vec<String>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let entries: Vec<String> = conn
            .lrange(queue, 0, count as isize - 1)
            .await?;
        Ok(entries)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
