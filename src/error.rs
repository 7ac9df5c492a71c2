//! Error types for the analytics queue.
//!
//! None of these ever reach callers of [`EventQueue::enqueue`](crate::EventQueue::enqueue):
//! delivery failures are absorbed by the queue's retry policy. They surface only when building
//! events, validating configuration, starting a queue, or from a [`Transport`](crate::Transport)
//! implementation.
use std::time::Duration;
use thiserror::Error;

use crate::backoff::BackoffError;

/// Failure to deliver one batch to the collection endpoint.
#[derive(Debug, Error)]
pub enum SendError {
    /// The collector answered `429 Too Many Requests`.
    #[error("collector rate limited the batch (HTTP 429)")]
    RateLimited,

    /// The collector answered with a non-2xx, non-429 status.
    #[error("collector returned HTTP {0}")]
    Status(u16),

    /// The request did not complete within the configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection, DNS or protocol failure below HTTP.
    #[error("transport error: {0}")]
    Transport(String),

    /// The batch could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// File-backed transports.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SendError {
    /// Whether the collector explicitly throttled us.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimited => Some(429),
            Self::Status(code) => Some(*code),
            _ => None,
        }
    }
}

/// Invalid queue configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("max_queue_size must be > 0")]
    ZeroQueueSize,

    #[error("flush_interval must be > 0")]
    ZeroFlushInterval,

    #[error("request_timeout must be > 0")]
    ZeroRequestTimeout,

    #[error("endpoint {endpoint:?} is not a valid http(s) URL: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("invalid backoff: {0}")]
    Backoff(#[from] BackoffError),

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Invalid event passed to the event builder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("event name must not be empty")]
    EmptyName,
}

/// Errors returned while starting an [`EventQueue`](crate::EventQueue).
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue spawns its flush timer on tokio and must be started inside a runtime.
    #[error("no tokio runtime available; start the queue from within a runtime")]
    NoRuntime,

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}
