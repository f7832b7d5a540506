use std::env;

/// Connection settings for the shared job queue.
///
/// Read from `REDIS_HOST` / `REDIS_PORT` so the same image works in-cluster
/// and on a laptop pointed at a local Redis.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub host: String,
    pub port: u16,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
        }
    }
}

impl QueueConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let host = env::var("REDIS_HOST").unwrap_or(defaults.host);
        let port = env::var("REDIS_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);
        Self { host, port }
    }

    pub fn url(&self) -> String {
        format!("redis://{}:{}", self.host, self.port)
    }
}

/// Knobs for the worker-fleet scaling loop.
#[derive(Debug, Clone)]
pub struct ScalingConfig {
    /// Deployment whose replica count the orchestrator drives.
    pub deployment: String,
    /// Label selector matching the worker pods.
    pub pod_selector: String,
    pub min_pods: u32,
    pub max_pods: u32,
    /// Target backlog-to-pod ratio.
    pub jobs_per_pod: u32,
    pub check_interval_ms: u64,
    /// Average cores per pod above which one extra pod is added.
    pub cpu_high_watermark: f64,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            deployment: "code-exec-workers".to_string(),
            pod_selector: "app=code-exec-worker".to_string(),
            min_pods: 1,
            max_pods: 10,
            jobs_per_pod: 5,
            check_interval_ms: 10_000,
            cpu_high_watermark: 0.8,
        }
    }
}

/// Per-worker timing knobs.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How long one blocking pop waits before the loop re-checks shutdown.
    pub pop_timeout_ms: u64,
    /// Single-attempt webhook POST timeout.
    pub webhook_timeout_ms: u64,
    /// Backoff after a queue pop failure.
    pub error_backoff_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            pop_timeout_ms: 5_000,
            webhook_timeout_ms: 5_000,
            error_backoff_ms: 1_000,
        }
    }
}
