//! Shutdown hooks.
//!
//! A browser flushes analytics on `beforeunload`; a service does it on its graceful-shutdown
//! signal. These helpers tie [`EventQueue::shutdown`] to any future the host resolves when it is
//! about to exit.

use std::future::Future;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::queue::EventQueue;
use crate::telemetry::TelemetrySink;

/// Spawn a task that runs the queue's forced shutdown flush once `signal` resolves.
///
/// Await the returned handle before exiting the process so the final batch has been sent.
pub fn on_signal<S, F>(queue: EventQueue<S>, signal: F) -> JoinHandle<()>
where
    S: TelemetrySink,
    S::Future: Send + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        signal.await;
        info!(pending = queue.pending(), "shutdown signal received; flushing analytics queue");
        queue.shutdown().await;
    })
}

/// [`on_signal`] wired to Ctrl-C / SIGINT.
///
/// If the signal handler cannot be installed the hook never fires and its handle never
/// completes, so do not make process exit depend on awaiting it. Call [`EventQueue::shutdown`]
/// on the normal exit path as well; it is idempotent.
pub fn on_ctrl_c<S>(queue: EventQueue<S>) -> JoinHandle<()>
where
    S: TelemetrySink,
    S::Future: Send + 'static,
{
    on_signal(queue, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c; analytics shutdown hook disabled");
            std::future::pending::<()>().await;
        }
    })
}
