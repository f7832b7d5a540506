
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crucible::config::ScalingConfig;
use crucible::error::CrucibleError;
use crucible::job::JobInput;
use crucible::orchestrator::Orchestrator;
use crucible::queue::{InMemoryQueue, JobQueue};
use test_support::FakeCluster;

fn job_input(problem: &str) -> JobInput {
    JobInput {
        source_code: "print('hi')".to_string(),
        language_id: 71,
        problem_id: problem.to_string(),
        callback_url: None,
        timeout_ms: None,
        memory_limit_mb: None,
        expected_output: None,
    }
}

fn orchestrator_with(
    cluster: FakeCluster,
    config: ScalingConfig,
) -> (Arc<Orchestrator>, Arc<InMemoryQueue>, Arc<FakeCluster>) {
    let queue = Arc::new(InMemoryQueue::new());
    let cluster = Arc::new(cluster);
    let orchestrator = Arc::new(Orchestrator::new(
        queue.clone(),
        cluster.clone(),
        config,
    ));
    (orchestrator, queue, cluster)
}

#[tokio::test]
async fn test_submit_returns_fresh_tokens_and_grows_queue() {
    let (orchestrator, queue, _) =
        orchestrator_with(FakeCluster::new(1), ScalingConfig::default());

    let mut tokens = HashSet::new();
    for i in 0..20 {
        let token = orchestrator
            .submit_job(job_input(&format!("p{i}")))
            .await
            .unwrap();
        assert!(tokens.insert(token), "tokens must never repeat");
    }

    assert_eq!(queue.len().await.unwrap(), 20);
}

#[tokio::test]
async fn test_submit_fails_after_shutdown() {
    let (orchestrator, _, _) =
        orchestrator_with(FakeCluster::new(1), ScalingConfig::default());

    orchestrator.shutdown().await;

    let result = orchestrator.submit_job(job_input("p1")).await;
    assert!(matches!(result, Err(CrucibleError::QueueUnavailable(_))));

    // Second shutdown is a no-op.
    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_queue_status_degrades_without_cluster() {
    let (orchestrator, queue, _) =
        orchestrator_with(FakeCluster::failing(), ScalingConfig::default());
    queue.push_right("pending".to_string()).await.unwrap();

    let status = orchestrator.queue_status().await.unwrap();
    assert_eq!(status.queued, 1);
    assert_eq!(status.worker_count, 0);
}

#[tokio::test]
async fn test_scaling_loop_patches_and_stops() {
    let config = ScalingConfig {
        min_pods: 1,
        max_pods: 10,
        jobs_per_pod: 5,
        check_interval_ms: 50,
        ..ScalingConfig::default()
    };
    // Empty queue, 3 pods: every tick wants 1 replica.
    let (orchestrator, _, cluster) = orchestrator_with(FakeCluster::with_cpu(3, "100m"), config);

    orchestrator.start_scaling_loop();
    assert!(orchestrator.scaling_loop_running());

    tokio::time::sleep(Duration::from_millis(300)).await;
    let patched = cluster.patched();
    assert!(!patched.is_empty());
    assert!(patched.iter().all(|&replicas| replicas == 1));

    orchestrator.stop_scaling_loop();
    assert!(!orchestrator.scaling_loop_running());

    tokio::time::sleep(Duration::from_millis(200)).await;
    let after_stop = cluster.patched().len();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(cluster.patched().len(), after_stop);

    // Stopping again is a no-op.
    orchestrator.stop_scaling_loop();
}

#[tokio::test]
async fn test_restarting_scaling_loop_replaces_timer() {
    let config = ScalingConfig {
        check_interval_ms: 50,
        ..ScalingConfig::default()
    };
    let (orchestrator, _, cluster) = orchestrator_with(FakeCluster::with_cpu(3, "100m"), config);

    orchestrator.start_scaling_loop();
    orchestrator.start_scaling_loop();
    assert!(orchestrator.scaling_loop_running());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!cluster.patched().is_empty());

    orchestrator.shutdown().await;
    assert!(!orchestrator.scaling_loop_running());
}
