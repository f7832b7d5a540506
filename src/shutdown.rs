//! Process shutdown for both binaries.
//!
//! One cancellation token fans out to everything with an in-flight
//! obligation: the submission listener stops accepting, the scaling timer
//! stops ticking, and a worker finishes the job it already popped. A popped
//! job is no longer recoverable from the queue, so abandoning it mid-drain
//! would silently lose the submission. The orchestrator-side ordering (stop
//! the timer, then close the queue client) is owned by
//! [`Orchestrator::shutdown`](crate::orchestrator::Orchestrator::shutdown);
//! this module only decides *when* draining starts.

use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

/// Install the SIGTERM/SIGINT listener and hand out the drain token.
///
/// The first signal starts a graceful drain. A worker mid-job may take the
/// full compile and execute budget to finish, so a second signal gives up on
/// draining and exits immediately.
pub fn install_shutdown_handler() -> CancellationToken {
    let token = CancellationToken::new();

    let trigger = token.clone();
    tokio::spawn(async move {
        let first = wait_for_signal().await;
        tracing::info!(
            signal = first,
            "Draining: in-flight jobs finish, nothing new starts"
        );
        trigger.cancel();

        let second = wait_for_signal().await;
        tracing::warn!(signal = second, "Second signal, exiting without draining");
        std::process::exit(130);
    });

    token
}

/// Wait for SIGTERM (cluster scale-down or rollout) or SIGINT (operator) and
/// report which one arrived.
async fn wait_for_signal() -> &'static str {
    let mut sigterm =
        signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    }
}
