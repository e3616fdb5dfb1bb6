//! Graceful shutdown helpers for the binary.

use std::time::Duration;

use tokio::task::JoinHandle;

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Wait up to `grace` for `handle` to finish, aborting it otherwise.
///
/// Aborting drops the task's future, releasing whatever it holds (such as
/// an arrival bus handle). Returns the task's output if it finished in time.
pub async fn join_or_abort<T>(task: &'static str, handle: JoinHandle<T>, grace: Duration) -> Option<T> {
    let abort = handle.abort_handle();
    match tokio::time::timeout(grace, handle).await {
        Ok(Ok(output)) => Some(output),
        Ok(Err(e)) => {
            tracing::warn!(task, error = %e, "Background task failed");
            None
        }
        Err(_) => {
            tracing::warn!(task, grace_ms = grace.as_millis() as u64, "Background task did not stop in time, aborting");
            abort.abort();
            None
        }
    }
}
