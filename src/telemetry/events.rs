use std::fmt;
use std::time::Duration;

/// What kicked off a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlushTrigger {
    /// The periodic flush timer fired.
    Timer,
    /// `enqueue` filled the buffer to `max_queue_size`.
    Capacity,
    /// An explicit `EventQueue::flush` call.
    Manual,
    /// Shutdown forced a final flush, overriding any in-flight one.
    Shutdown,
}

impl FlushTrigger {
    pub fn is_forced(self) -> bool {
        matches!(self, FlushTrigger::Shutdown)
    }
}

impl fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlushTrigger::Timer => "timer",
            FlushTrigger::Capacity => "capacity",
            FlushTrigger::Manual => "manual",
            FlushTrigger::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

/// Why a batch left the queue without being delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The retry counter went past `max_retries`.
    RetriesExhausted { attempts: u32 },
    /// The batch failed, or came back from backoff, after shutdown.
    Shutdown,
}

/// Lifecycle events emitted by the queue.
///
/// They trace each batch through `Buffered → Sending → {Delivered | Retrying → Sending | Dropped}`
/// and are fed to the queue's [`TelemetrySink`](super::TelemetrySink).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    /// A batch was taken from the buffer and handed to the transport.
    Sending { size: usize, trigger: FlushTrigger },
    /// The collector accepted the batch.
    Delivered { size: usize },
    /// The batch failed and will be reinserted at the front of the buffer after `delay`.
    Retrying { size: usize, retry_count: u32, delay: Duration, rate_limited: bool },
    /// The batch was discarded.
    Dropped { size: usize, reason: DropReason },
}

impl QueueEvent {
    /// Short, stable name for log fields and counters.
    pub fn kind(&self) -> &'static str {
        match self {
            QueueEvent::Sending { .. } => "sending",
            QueueEvent::Delivered { .. } => "delivered",
            QueueEvent::Retrying { rate_limited: true, .. } => "rate_limited",
            QueueEvent::Retrying { .. } => "retrying",
            QueueEvent::Dropped { .. } => "dropped",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::RetriesExhausted { attempts } => {
                write!(f, "retries exhausted after {} attempts", attempts)
            }
            DropReason::Shutdown => write!(f, "shutdown"),
        }
    }
}

impl fmt::Display for QueueEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueEvent::Sending { size, trigger } => {
                write!(f, "Sending(size={}, trigger={})", size, trigger)
            }
            QueueEvent::Delivered { size } => write!(f, "Delivered(size={})", size),
            QueueEvent::Retrying { size, retry_count, delay, rate_limited } => write!(
                f,
                "Retrying(size={}, retry=#{}, delay={:?}, rate_limited={})",
                size, retry_count, delay, rate_limited
            ),
            QueueEvent::Dropped { size, reason } => {
                write!(f, "Dropped(size={}, reason={})", size, reason)
            }
        }
    }
}
