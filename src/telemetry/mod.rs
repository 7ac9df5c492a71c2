//! Observability for the queue itself.
//!
//! Every state change of a batch is emitted as a [`QueueEvent`] into a [`TelemetrySink`].
//! Sinks are `tower::Service<QueueEvent>` so they compose like any other tower service.
//!
//! - [`LogSink`] (default): structured `tracing` output.
//! - [`MemorySink`]: bounded in-memory buffer, mostly for tests and debug endpoints.
//! - [`NullSink`]: discards everything.

pub mod events;
pub mod sinks;

pub use events::{DropReason, FlushTrigger, QueueEvent};
pub use sinks::{emit_best_effort, LogSink, MemorySink, NullSink, TelemetrySink};
