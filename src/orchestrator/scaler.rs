//! Scaling math and the reconcile step.
//!
//! The baseline replica count tracks backlog depth; observed CPU pressure
//! adds at most one pod per tick. The single-step bump keeps the controller
//! stable while still reacting to compute-bound workloads whose jobs sit
//! inside a pod longer than the tick interval, which queue length alone
//! cannot see.

use crate::config::ScalingConfig;
use crate::error::Result;
use crate::orchestrator::cluster::{ClusterApi, PodUsage};
use crate::queue::JobQueue;

/// Backlog-driven replica count: `ceil(queued / jobs_per_pod)` clamped to
/// `[min_pods, max_pods]`. Never drops below `min_pods`, so one warm worker
/// is always available.
pub fn desired_replicas(queued: usize, config: &ScalingConfig) -> u32 {
    (queued as u32)
        .div_ceil(config.jobs_per_pod.max(1))
        .clamp(config.min_pods, config.max_pods)
}

/// Parse a CPU resource quantity into cores: `n` nanocores, `u` microcores,
/// `m` millicores, bare numbers are cores.
pub fn parse_cpu_quantity(quantity: &str) -> Option<f64> {
    let quantity = quantity.trim();
    if let Some(value) = quantity.strip_suffix('n') {
        value.parse::<f64>().ok().map(|v| v / 1e9)
    } else if let Some(value) = quantity.strip_suffix('u') {
        value.parse::<f64>().ok().map(|v| v / 1e6)
    } else if let Some(value) = quantity.strip_suffix('m') {
        value.parse::<f64>().ok().map(|v| v / 1e3)
    } else {
        quantity.parse::<f64>().ok()
    }
}

/// Average cores per pod, `None` when there is no usable signal (no metrics
/// or no pods).
pub fn average_cpu(usage: &[PodUsage], pod_count: usize) -> Option<f64> {
    if usage.is_empty() || pod_count == 0 {
        return None;
    }
    let total: f64 = usage
        .iter()
        .filter_map(|pod| parse_cpu_quantity(&pod.cpu))
        .sum();
    Some(total / pod_count as f64)
}

/// One reconcile tick. Returns the patched replica count, or `None` when the
/// deployment already matched. Errors propagate to the caller, which logs
/// and waits for the next tick.
pub async fn reconcile(
    queue: &dyn JobQueue,
    cluster: &dyn ClusterApi,
    config: &ScalingConfig,
) -> Result<Option<u32>> {
    let queued = queue.len().await?;
    let pods = cluster.pod_count(&config.pod_selector).await?;

    let mut desired = desired_replicas(queued, config);

    match cluster.pod_usage(&config.pod_selector).await {
        Ok(usage) => {
            if let Some(avg_cpu) = average_cpu(&usage, pods) {
                if avg_cpu > config.cpu_high_watermark {
                    desired = (desired + 1).min(config.max_pods);
                    tracing::debug!(avg_cpu, desired, "CPU pressure above watermark");
                }
            }
        }
        Err(e) => {
            tracing::debug!(error = %e, "Pod metrics unavailable, scaling on backlog only");
        }
    }

    if desired as usize == pods {
        return Ok(None);
    }

    cluster.patch_replicas(&config.deployment, desired).await?;
    tracing::info!(
        queued,
        current_pods = pods,
        desired,
        deployment = %config.deployment,
        "Scaled worker deployment"
    );
    Ok(Some(desired))
}
