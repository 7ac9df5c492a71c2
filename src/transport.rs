//! Delivery of batches to the collection endpoint.
//!
//! [`Transport`] is the seam between the queue and the network. [`HttpTransport`] is the
//! production implementation: one `POST` per batch with a JSON array body. Responses map onto
//! the queue's three outcomes through [`classify_status`]: any 2xx is success, `429` is a rate
//! limit, everything else (including connection errors and timeouts) is a generic failure.

use async_trait::async_trait;
use reqwest::Url;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::config::QueueConfig;
use crate::error::{QueueError, SendError};
use crate::event::QueuedEvent;

/// Sends one batch; the queue interprets the result.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    async fn send(&self, batch: &[QueuedEvent]) -> Result<(), SendError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, batch: &[QueuedEvent]) -> Result<(), SendError> {
        (**self).send(batch).await
    }
}

/// Map an HTTP status code onto a send outcome.
pub fn classify_status(status: u16) -> Result<(), SendError> {
    match status {
        200..=299 => Ok(()),
        429 => Err(SendError::RateLimited),
        other => Err(SendError::Status(other)),
    }
}

/// `POST`s each batch as JSON to the configured endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, QueueError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QueueError::Client(e.to_string()))?;
        Ok(Self { client, endpoint, timeout })
    }

    pub fn from_config(config: &QueueConfig) -> Result<Self, QueueError> {
        Self::new(config.endpoint_url()?, config.request_timeout)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, batch: &[QueuedEvent]) -> Result<(), SendError> {
        let response =
            self.client.post(self.endpoint.clone()).json(batch).send().await.map_err(|e| {
                if e.is_timeout() {
                    SendError::Timeout(self.timeout)
                } else {
                    SendError::Transport(e.to_string())
                }
            })?;
        classify_status(response.status().as_u16())
    }
}

#[derive(Debug, Clone)]
enum Reply {
    Status(u16),
    Error(String),
}

#[derive(Debug, Default)]
struct Recording {
    script: VecDeque<Reply>,
    batches: Vec<Vec<QueuedEvent>>,
}

/// In-memory transport that records every batch and answers from a script.
///
/// Once the script runs out every send succeeds. Clones share the same recording, so a test can
/// keep one handle while the queue owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    inner: Arc<Mutex<Recording>>,
    latency: Option<Duration>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue up HTTP statuses for the next sends, in order.
    pub fn respond_with(self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.lock().script.extend(statuses.into_iter().map(Reply::Status));
        self
    }

    /// Queue up a transport-level failure for the next send.
    pub fn fail_next(self, reason: impl Into<String>) -> Self {
        self.lock().script.push_back(Reply::Error(reason.into()));
        self
    }

    /// Hold each send open for `latency` (tokio time) before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Every batch received, including failed attempts.
    pub fn batches(&self) -> Vec<Vec<QueuedEvent>> {
        self.lock().batches.clone()
    }

    pub fn attempts(&self) -> usize {
        self.lock().batches.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recording> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, batch: &[QueuedEvent]) -> Result<(), SendError> {
        let reply = {
            let mut rec = self.lock();
            rec.batches.push(batch.to_vec());
            rec.script.pop_front()
        };
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match reply {
            None => Ok(()),
            Some(Reply::Status(code)) => classify_status(code),
            Some(Reply::Error(reason)) => Err(SendError::Transport(reason)),
        }
    }
}
