//! The control plane between submission and execution.
//!
//! The orchestrator owns the queue as a producer: it assigns tokens, pushes
//! serialized jobs, and answers backlog/fleet visibility questions. A single
//! periodic reconciler drives the worker deployment's replica count against
//! backlog depth and CPU pressure. Submissions never wait on the scaler.

pub mod cluster;
pub mod scaler;

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::ScalingConfig;
use crate::error::Result;
use crate::job::{Job, JobInput};
use crate::queue::JobQueue;
use cluster::ClusterApi;

/// Point-in-time backlog and fleet snapshot. Values may be stale; nothing
/// locks while reading them.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    pub queued: usize,
    pub worker_count: usize,
}

pub struct Orchestrator {
    queue: Arc<dyn JobQueue>,
    cluster: Arc<dyn ClusterApi>,
    config: ScalingConfig,
    scaling: Mutex<Option<CancellationToken>>,
}

impl Orchestrator {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        cluster: Arc<dyn ClusterApi>,
        config: ScalingConfig,
    ) -> Self {
        Self {
            queue,
            cluster,
            config,
            scaling: Mutex::new(None),
        }
    }

    /// Accept one submission: assign a fresh token, enqueue, return the
    /// token. Constant-time; execution happens elsewhere.
    pub async fn submit_job(&self, input: JobInput) -> Result<String> {
        let job = Job::from_input(input);
        let payload = serde_json::to_string(&job)?;
        self.queue.push_right(payload).await?;

        tracing::info!(token = %job.token, problem_id = %job.problem_id, "Job queued");
        Ok(job.token)
    }

    /// Enqueue a validated batch, returning tokens in input order.
    pub async fn submit_batch(&self, inputs: Vec<JobInput>) -> Result<Vec<String>> {
        let mut tokens = Vec::with_capacity(inputs.len());
        for input in inputs {
            tokens.push(self.submit_job(input).await?);
        }
        Ok(tokens)
    }

    /// Backlog depth plus live worker count. A cluster read failure degrades
    /// to `worker_count: 0` rather than failing the whole call.
    pub async fn queue_status(&self) -> Result<QueueStatus> {
        let queued = self.queue.len().await?;
        let worker_count = match self.cluster.pod_count(&self.config.pod_selector).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read worker count");
                0
            }
        };
        Ok(QueueStatus {
            queued,
            worker_count,
        })
    }

    /// Install the periodic reconcile timer. Starting while a loop is
    /// running replaces the previous timer.
    pub fn start_scaling_loop(&self) {
        let token = CancellationToken::new();
        let loop_token = token.clone();
        let queue = self.queue.clone();
        let cluster = self.cluster.clone();
        let config = self.config.clone();

        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_millis(config.check_interval_ms.max(1)));
            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = ticker.tick() => {
                        // Failures are logged and swallowed; the next tick retries.
                        if let Err(e) =
                            scaler::reconcile(queue.as_ref(), cluster.as_ref(), &config).await
                        {
                            tracing::warn!(error = %e, "Scaling tick failed");
                        }
                    }
                }
            }
        });

        if let Some(previous) = self.scaling.lock().unwrap().replace(token) {
            previous.cancel();
        }
        tracing::info!(
            interval_ms = self.config.check_interval_ms,
            deployment = %self.config.deployment,
            "Scaling loop started"
        );
    }

    /// Remove the reconcile timer. Idempotent.
    pub fn stop_scaling_loop(&self) {
        if let Some(token) = self.scaling.lock().unwrap().take() {
            token.cancel();
            tracing::info!("Scaling loop stopped");
        }
    }

    pub fn scaling_loop_running(&self) -> bool {
        self.scaling.lock().unwrap().is_some()
    }

    /// Ordered shutdown: stop the timer first, then close the queue client.
    /// Safe to call more than once.
    pub async fn shutdown(&self) {
        self.stop_scaling_loop();
        self.queue.close().await;
    }
}
