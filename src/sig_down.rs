//! Graceful shutdown coordination.
//!
//! SIGTERM/SIGINT trip a cancellation token that the HTTP listener and every
//! gateway background loop (rate-limit sweeping, and any future cache
//! refreshers) watch. Loops register through [`Shutdown::spawn`]; once the
//! listener has stopped accepting, [`Shutdown::drain`] gives them a bounded
//! grace window to exit so sweeps and in-flight bookkeeping finish before
//! the process does.

use std::future::Future;
use std::time::Duration;
use tokio::signal::unix::SignalKind;
use tokio::signal::unix::signal;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

pub struct Shutdown {
    tasks: TaskTracker,
    cancellation_token: CancellationToken,
}

impl Shutdown {
    /// Register the signal handlers. The watcher task is detached so it
    /// never holds up [`Shutdown::drain`].
    pub fn try_new() -> Result<Self, std::io::Error> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let cancellation_token = CancellationToken::new();
        let trip = cancellation_token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("SIGTERM received, draining"),
                _ = sigint.recv() => tracing::info!("SIGINT received, draining"),
            }
            trip.cancel();
        });
        Ok(Self {
            tasks: TaskTracker::new(),
            cancellation_token,
        })
    }

    /// A token subsystems can await for shutdown.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Track a background loop. The loop must exit once the cancellation
    /// token fires, or `drain` will report it.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(task);
    }

    /// Wait for every tracked loop to finish, up to `grace`. Returns whether
    /// all of them made it out in time.
    pub async fn drain(&self, grace: Duration) -> bool {
        self.tasks.close();
        let drained = tokio::time::timeout(grace, self.tasks.wait()).await.is_ok();
        if !drained {
            tracing::warn!(
                grace_secs = grace.as_secs(),
                remaining = self.tasks.len(),
                "background tasks did not drain in time"
            );
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn drain_waits_for_tracked_loops() {
        let shutdown = Shutdown::try_new().expect("signal registration");
        let finished = Arc::new(AtomicBool::new(false));

        let token = shutdown.cancellation_token();
        let flag = Arc::clone(&finished);
        shutdown.spawn(async move {
            token.cancelled().await;
            flag.store(true, Ordering::SeqCst);
        });

        shutdown.cancellation_token().cancel();
        assert!(shutdown.drain(Duration::from_secs(1)).await);
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn drain_reports_a_stuck_loop() {
        let shutdown = Shutdown::try_new().expect("signal registration");
        shutdown.spawn(async {
            // Ignores cancellation on purpose.
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        shutdown.cancellation_token().cancel();
        assert!(!shutdown.drain(Duration::from_millis(50)).await);
    }
}
