//! Delayed-task abstraction used to schedule backed-off retries.
//!
//! The queue never calls `tokio::time::sleep` directly for retry delays; it asks its
//! [`Sleeper`]. Production uses [`TokioSleeper`], which honours tokio's paused test clock, so
//! tests can drive the queue on virtual time or skip delays entirely with [`InstantSleeper`].

use futures::future::BoxFuture;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Abstraction for sleeping/waiting
pub trait Sleeper: Send + Sync + std::fmt::Debug {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// Production sleeper using tokio runtime
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Resolves immediately; retried batches go straight back into the buffer.
#[derive(Debug, Default, Clone, Copy)]
pub struct InstantSleeper;

impl Sleeper for InstantSleeper {
    fn sleep(&self, _duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(async {})
    }
}

/// Records every requested delay, then waits it out on tokio time.
#[derive(Debug, Clone, Default)]
pub struct TrackingSleeper {
    calls: Arc<Mutex<Vec<Duration>>>,
}

impl TrackingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far, in order.
    pub fn calls(&self) -> Vec<Duration> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Sleeper for TrackingSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(duration);
        Box::pin(tokio::time::sleep(duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn tokio_sleeper_follows_virtual_time() {
        let start = tokio::time::Instant::now();
        TokioSleeper.sleep(Duration::from_secs(30)).await;
        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn instant_sleeper_doesnt_advance_time() {
        let start = tokio::time::Instant::now();
        InstantSleeper.sleep(Duration::from_secs(10)).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn tracking_sleeper_records_and_waits() {
        let sleeper = TrackingSleeper::new();
        let start = tokio::time::Instant::now();

        sleeper.sleep(Duration::from_millis(1000)).await;
        sleeper.sleep(Duration::from_millis(2000)).await;

        assert_eq!(sleeper.calls(), vec![Duration::from_millis(1000), Duration::from_millis(2000)]);
        assert!(start.elapsed() >= Duration::from_millis(3000));
    }

    #[tokio::test]
    async fn tracking_sleeper_clones_share_history() {
        let sleeper = TrackingSleeper::new();
        let clone = sleeper.clone();
        drop(clone.sleep(Duration::from_millis(5)));
        assert_eq!(sleeper.calls(), vec![Duration::from_millis(5)]);
    }
}
