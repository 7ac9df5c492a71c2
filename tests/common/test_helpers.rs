#![allow(dead_code)]

use digiclick_telemetry::telemetry::MemorySink;
use digiclick_telemetry::{EventQueue, QueueConfig, QueuedEvent, RecordingTransport};
use std::time::Duration;

pub fn event(name: &str) -> QueuedEvent {
    QueuedEvent::builder(name).experiment("hero-copy", "b").build().unwrap()
}

pub fn names(events: &[QueuedEvent]) -> Vec<String> {
    events.iter().map(|e| e.event().to_string()).collect()
}

/// Default config: 1 s interval, 50 events, 3 retries, 1 s → 30 s backoff.
pub fn default_config() -> QueueConfig {
    QueueConfig::builder().build().unwrap()
}

/// Timer effectively disabled so tests drive flushes by hand.
pub fn manual_config() -> QueueConfig {
    QueueConfig::builder().flush_interval(Duration::from_secs(3600)).build().unwrap()
}

/// Route queue logs through the test harness writer. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn start_queue(
    config: QueueConfig,
    transport: &RecordingTransport,
    sink: &MemorySink,
) -> EventQueue<MemorySink> {
    init_tracing();
    EventQueue::builder(config)
        .transport(transport.clone())
        .telemetry(sink.clone())
        .start()
        .expect("queue starts inside the test runtime")
}

/// Let spawned flush tasks run without moving the paused clock.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
