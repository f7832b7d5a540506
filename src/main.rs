use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crucible::api::{self, ApiState};
use crucible::config::{QueueConfig, ScalingConfig, WorkerConfig};
use crucible::executor::Executor;
use crucible::orchestrator::cluster::{ClusterApi, HttpClusterClient};
use crucible::orchestrator::Orchestrator;
use crucible::queue::{JobQueue, RedisQueue};
use crucible::shutdown::install_shutdown_handler;
use crucible::worker::Worker;

#[derive(Parser, Debug)]
#[command(name = "crucible")]
#[command(about = "Cloud-native code execution service")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the submission API and the worker-fleet scaling loop
    Orchestrator {
        /// Address for the submission endpoint
        #[arg(long, default_value = "0.0.0.0:8000")]
        listen: SocketAddr,

        /// Worker deployment to scale
        #[arg(long, default_value = "code-exec-workers")]
        deployment: String,

        /// Label selector matching the worker pods
        #[arg(long, default_value = "app=code-exec-worker")]
        pod_selector: String,

        #[arg(long, default_value = "1")]
        min_pods: u32,

        #[arg(long, default_value = "10")]
        max_pods: u32,

        /// Target backlog-to-pod ratio
        #[arg(long, default_value = "5")]
        jobs_per_pod: u32,

        /// Reconcile interval in milliseconds
        #[arg(long, default_value = "10000")]
        check_interval_ms: u64,

        /// Average cores per pod above which one extra pod is added
        #[arg(long, default_value = "0.8")]
        cpu_high_watermark: f64,

        /// Cluster API base URL; defaults to the in-cluster service account
        #[arg(long)]
        cluster_url: Option<String>,

        /// Namespace, used with --cluster-url
        #[arg(long, default_value = "default")]
        namespace: String,
    },
    /// Run one worker process (queue drain + executor)
    Worker {},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let queue_config = QueueConfig::from_env();

    match args.command {
        Command::Orchestrator {
            listen,
            deployment,
            pod_selector,
            min_pods,
            max_pods,
            jobs_per_pod,
            check_interval_ms,
            cpu_high_watermark,
            cluster_url,
            namespace,
        } => {
            let scaling = ScalingConfig {
                deployment,
                pod_selector,
                min_pods,
                max_pods,
                jobs_per_pod,
                check_interval_ms,
                cpu_high_watermark,
            };

            let queue = Arc::new(RedisQueue::connect(&queue_config).await?);
            let cluster: Arc<dyn ClusterApi> = match cluster_url {
                Some(url) => Arc::new(HttpClusterClient::new(url, namespace, None)?),
                None => Arc::new(HttpClusterClient::in_cluster()?),
            };

            let orchestrator = Arc::new(Orchestrator::new(queue, cluster, scaling));
            orchestrator.start_scaling_loop();

            let shutdown = install_shutdown_handler();
            let app = api::router(ApiState {
                orchestrator: orchestrator.clone(),
            });

            tracing::info!(addr = %listen, "Starting submission endpoint");
            let listener = tokio::net::TcpListener::bind(listen).await?;
            let serve_shutdown = shutdown.clone();
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { serve_shutdown.cancelled().await })
                .await?;

            orchestrator.shutdown().await;
        }
        Command::Worker {} => {
            let queue = Arc::new(RedisQueue::connect(&queue_config).await?);
            let shutdown = install_shutdown_handler();

            let worker = Worker::new(
                queue.clone(),
                Executor::new(),
                WorkerConfig::default(),
                shutdown,
            )?;
            worker.run().await;

            queue.close().await;
        }
    }

    Ok(())
}
