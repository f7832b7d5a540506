//! The worker drain loop.
//!
//! One worker process handles one job at a time: block-pop from the shared
//! queue, hand it to the [`Executor`], POST the result to the job's callback
//! URL if it has one. Parallelism comes from running many worker pods, not
//! from threads inside a worker.
//!
//! Delivery is at-most-once by contract: a failed webhook POST is logged and
//! the result dropped, never re-queued. Re-queuing would re-execute the
//! submitted code.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::WorkerConfig;
use crate::error::Result;
use crate::executor::Executor;
use crate::job::{Job, JobResult};
use crate::queue::JobQueue;

pub struct Worker {
    /// Random id, used only to correlate log lines across the fleet.
    id: String,
    queue: Arc<dyn JobQueue>,
    executor: Executor,
    http: reqwest::Client,
    config: WorkerConfig,
    shutdown: CancellationToken,
}

impl Worker {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        executor: Executor,
        config: WorkerConfig,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.webhook_timeout_ms))
            .build()?;

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            queue,
            executor,
            http,
            config,
            shutdown,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Drain jobs until shutdown. An in-flight job always completes; the
    /// bounded pop timeout is what makes cancellation responsive.
    pub async fn run(&self) {
        tracing::info!(worker_id = %self.id, "Worker started");

        let pop_timeout = Duration::from_millis(self.config.pop_timeout_ms);
        let backoff = Duration::from_millis(self.config.error_backoff_ms);

        while !self.shutdown.is_cancelled() {
            let popped = tokio::select! {
                popped = self.queue.blocking_pop_left(pop_timeout) => popped,
                _ = self.shutdown.cancelled() => break,
            };

            match popped {
                Ok(Some(payload)) => self.process(payload).await,
                Ok(None) => {} // empty queue, re-check shutdown
                Err(e) => {
                    tracing::warn!(worker_id = %self.id, error = %e, "Queue pop failed, backing off");
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = self.shutdown.cancelled() => break,
                    }
                }
            }
        }

        tracing::info!(worker_id = %self.id, "Worker stopped");
    }

    async fn process(&self, payload: String) {
        let job: Job = match serde_json::from_str(&payload) {
            Ok(job) => job,
            Err(e) => {
                tracing::warn!(worker_id = %self.id, error = %e, "Dropping malformed job payload");
                return;
            }
        };

        tracing::info!(
            worker_id = %self.id,
            "Processing job {} for problem {}",
            job.token,
            job.problem_id
        );

        let result = self.executor.execute(&job).await;

        tracing::info!(
            worker_id = %self.id,
            token = %result.token,
            status = %result.status,
            execution_time = ?result.execution_time,
            exit_code = result.exit_code,
            "Job finished"
        );

        match &job.callback_url {
            Some(url) => self.deliver(url, &result).await,
            None => {
                tracing::info!(token = %result.token, "No callback URL, result discarded");
            }
        }
    }

    /// Single-attempt webhook POST. The receiver's response is ignored beyond
    /// logging.
    async fn deliver(&self, url: &str, result: &JobResult) {
        match self.http.post(url).json(result).send().await {
            Ok(response) => {
                tracing::info!(
                    token = %result.token,
                    status_code = %response.status(),
                    "Webhook delivered"
                );
            }
            Err(e) => {
                tracing::warn!(
                    token = %result.token,
                    error = %e,
                    "Webhook delivery failed, result dropped"
                );
            }
        }
    }
}
