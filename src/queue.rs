//! The shared job queue.
//!
//! The queue is the only coupling between the orchestrator and the worker
//! fleet: the orchestrator pushes serialized [`Job`](crate::job::Job)
//! descriptors on the right, workers block-pop from the left. [`RedisQueue`]
//! is the production implementation (one Redis list); [`InMemoryQueue`] backs
//! tests and single-process local runs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::config::QueueConfig;
use crate::error::{CrucibleError, Result};

/// List key shared by every producer and consumer.
pub const QUEUE_KEY: &str = "code-execution-queue";

/// FIFO queue of serialized job descriptors.
///
/// Push is atomic; pop is blocking with a timeout and atomic (a popped job is
/// owned by exactly one worker and no longer recoverable from the queue).
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn push_right(&self, value: String) -> Result<()>;

    /// Pop the oldest entry, waiting up to `timeout`. `Ok(None)` means the
    /// timeout elapsed with the queue empty; callers use a bounded timeout so
    /// shutdown is observed between pops.
    async fn blocking_pop_left(&self, timeout: Duration) -> Result<Option<String>>;

    async fn len(&self) -> Result<usize>;

    /// Mark the queue closed. Idempotent; subsequent operations fail with
    /// `QueueUnavailable`.
    async fn close(&self);
}

/// Redis-backed queue: RPUSH / BLPOP / LLEN on a single list.
pub struct RedisQueue {
    conn: ConnectionManager,
    key: String,
    closed: AtomicBool,
}

impl RedisQueue {
    pub async fn connect(config: &QueueConfig) -> Result<Self> {
        Self::connect_with_key(config, QUEUE_KEY).await
    }

    pub async fn connect_with_key(config: &QueueConfig, key: &str) -> Result<Self> {
        let client = redis::Client::open(config.url())
            .map_err(|e| CrucibleError::QueueUnavailable(e.to_string()))?;
        let conn = client
            .get_tokio_connection_manager()
            .await
            .map_err(|e| CrucibleError::QueueUnavailable(e.to_string()))?;

        tracing::info!(url = %config.url(), key, "Connected to job queue");

        Ok(Self {
            conn,
            key: key.to_string(),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CrucibleError::QueueUnavailable(
                "queue client is closed".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl JobQueue for RedisQueue {
    async fn push_right(&self, value: String) -> Result<()> {
        self.ensure_open()?;
        let mut conn = self.conn.clone();
        conn.rpush::<_, _, ()>(&self.key, value)
            .await
            .map_err(|e| CrucibleError::QueueUnavailable(e.to_string()))
    }

    async fn blocking_pop_left(&self, timeout: Duration) -> Result<Option<String>> {
        self.ensure_open()?;
        let mut conn = self.conn.clone();
        // BLPOP takes whole seconds; 0 would block forever.
        let secs = timeout.as_secs().max(1) as f64;
        let popped: Option<(String, String)> = conn
            .blpop(&self.key, secs)
            .await
            .map_err(|e| CrucibleError::QueueUnavailable(e.to_string()))?;
        Ok(popped.map(|(_, value)| value))
    }

    async fn len(&self) -> Result<usize> {
        self.ensure_open()?;
        let mut conn = self.conn.clone();
        conn.llen(&self.key)
            .await
            .map_err(|e| CrucibleError::QueueUnavailable(e.to_string()))
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::info!(key = %self.key, "Queue client closed");
        }
    }
}

/// In-process queue with the same contract as [`RedisQueue`].
#[derive(Default)]
pub struct InMemoryQueue {
    items: Mutex<VecDeque<String>>,
    notify: Notify,
    closed: AtomicBool,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CrucibleError::QueueUnavailable(
                "queue client is closed".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl JobQueue for InMemoryQueue {
    async fn push_right(&self, value: String) -> Result<()> {
        self.ensure_open()?;
        self.items.lock().unwrap().push_back(value);
        self.notify.notify_one();
        Ok(())
    }

    async fn blocking_pop_left(&self, timeout: Duration) -> Result<Option<String>> {
        let deadline = Instant::now() + timeout;
        loop {
            self.ensure_open()?;
            if let Some(value) = self.items.lock().unwrap().pop_front() {
                return Ok(Some(value));
            }
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return Ok(None);
            };
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep(remaining) => return Ok(None),
            }
        }
    }

    async fn len(&self) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.items.lock().unwrap().len())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        // Wake blocked pops so they observe the closed flag.
        self.notify.notify_waiters();
    }
}
