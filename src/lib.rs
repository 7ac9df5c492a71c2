#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # DigiClick telemetry
//!
//! Client-side analytics relay for the DigiClick AI site: telemetry events produced by
//! application code are buffered, shipped to the collection endpoint in batches, and retried with
//! bounded exponential backoff when the collector is down or rate limiting.
//!
//! ## Features
//!
//! - **Batching**: periodic flush (default every second) plus an early flush at 50 pending events
//! - **Rate-limit aware**: `429` responses back off `1s, 2s, 4s…` capped at 30s
//! - **Bounded retries**: batches are dropped with an error log after 3 failed retries
//! - **Shutdown flush**: a forced final flush wired to any shutdown signal
//! - **Never fails the caller**: [`EventQueue::enqueue`] is synchronous and infallible
//! - **Observable**: lifecycle events to `tracing` or any `tower::Service` sink
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use digiclick_telemetry::{shutdown, EventContext, EventQueue, QueueConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = QueueConfig::builder()
//!         .endpoint("https://digiclick.ai/api/analytics/events")
//!         .build()?;
//!     let queue = EventQueue::builder(config).start()?;
//!     let hook = shutdown::on_ctrl_c(queue.clone());
//!
//!     let visitor = EventContext::new()
//!         .with_experiment("hero-copy", "b")
//!         .with_session("9f3c");
//!     queue.enqueue(visitor.event("page_view").property("path", "/").build()?);
//!     queue.enqueue(visitor.event("cta_click").property("button", "book-demo").build()?);
//!
//!     // ... serve traffic; the hook flushes on Ctrl-C. On a normal exit path flush directly.
//!     queue.shutdown().await;
//!     hook.abort();
//!     Ok(())
//! }
//! ```

pub mod backoff;
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod jitter;
pub mod queue;
pub mod shutdown;
pub mod sleeper;
pub mod telemetry;
pub mod transport;

// Re-exports
pub use backoff::Backoff;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{QueueConfig, QueueConfigBuilder};
pub use error::{ConfigError, EventError, QueueError, SendError};
pub use event::{EventContext, QueuedEvent, QueuedEventBuilder};
pub use jitter::Jitter;
pub use queue::{EventQueue, EventQueueBuilder, QueueStats};
pub use sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper};
pub use telemetry::{FlushTrigger, QueueEvent};
pub use transport::{HttpTransport, RecordingTransport, Transport};
