//! The analytics event queue.
//!
//! Events are buffered in memory and delivered to the collection endpoint in batches:
//!
//! - every `flush_interval` by a background timer,
//! - immediately once `max_queue_size` events are pending,
//! - once more, forced, on [`EventQueue::shutdown`].
//!
//! A flush swaps the whole buffer out under the lock before any I/O, so events enqueued while a
//! request is outstanding land in a fresh buffer and are never sent twice. Only one non-forced
//! flush is in flight at a time; shutdown overrides that to avoid losing the tail.
//!
//! Failure handling (the retry counter is queue-wide):
//!
//! | outcome | effect |
//! | --- | --- |
//! | 2xx | counter reset to 0 |
//! | 429 | counter +1; batch reinserted at the front after `backoff.delay(counter)` |
//! | other failure | counter +1; batch reinserted at the front immediately, retried next tick |
//! | counter > `max_retries` | batch dropped with an error log, counter reset to 0 |
//!
//! With `backoff_on_failure` set, other failures are delayed like 429s.
//!
//! [`EventQueue::enqueue`] never blocks on I/O and never fails.
//!
//! ```rust,no_run
//! use digiclick_telemetry::{EventQueue, QueueConfig, QueuedEvent};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = QueueConfig::builder()
//!     .endpoint("https://digiclick.ai/api/analytics/events")
//!     .build()?;
//! let queue = EventQueue::builder(config).start()?;
//!
//! queue.enqueue(QueuedEvent::builder("page_view").property("path", "/pricing").build()?);
//!
//! // on teardown
//! queue.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, trace, warn};

use crate::backoff::Backoff;
use crate::config::QueueConfig;
use crate::error::{QueueError, SendError};
use crate::event::QueuedEvent;
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::telemetry::{emit_best_effort, DropReason, FlushTrigger, LogSink, QueueEvent, TelemetrySink};
use crate::transport::{HttpTransport, Transport};

/// Point-in-time view of the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Events waiting in the buffer.
    pub pending: usize,
    /// Current value of the queue-wide retry counter.
    pub retry_count: u32,
    /// Whether a non-forced flush is outstanding.
    pub in_flight: bool,
    /// Events acknowledged by the collector.
    pub delivered: u64,
    /// Events discarded after exhausting retries or at shutdown.
    pub dropped: u64,
    /// Send attempts, including retries.
    pub batches_sent: u64,
}

#[derive(Debug, Default)]
struct QueueState {
    buffer: VecDeque<QueuedEvent>,
    retry_count: u32,
    in_flight: bool,
    shut_down: bool,
    delivered: u64,
    dropped: u64,
    batches_sent: u64,
}

impl QueueState {
    /// Put a failed batch back ahead of anything enqueued since, keeping its internal order.
    fn reinsert_front(&mut self, batch: Vec<QueuedEvent>) {
        for event in batch.into_iter().rev() {
            self.buffer.push_front(event);
        }
    }
}

/// What to do with a batch after a failed send.
enum Disposition {
    Requeued { retry_count: u32 },
    Delayed { retry_count: u32, delay: Duration },
    Dropped { reason: DropReason },
}

struct Shared<S> {
    config: QueueConfig,
    backoff: Backoff,
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
    sink: S,
    runtime: Handle,
    state: Mutex<QueueState>,
}

/// Cloneable handle to a running queue. All clones share one buffer.
pub struct EventQueue<S = LogSink> {
    shared: Arc<Shared<S>>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl<S> Clone for EventQueue<S> {
    fn clone(&self) -> Self {
        Self { shared: self.shared.clone(), ticker: self.ticker.clone() }
    }
}

impl<S> std::fmt::Debug for EventQueue<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue")
            .field("config", &self.shared.config)
            .field("transport", &self.shared.transport)
            .field("stats", &self.shared.stats())
            .finish()
    }
}

impl EventQueue<LogSink> {
    /// Start configuring a queue. Defaults: HTTP transport built from `config`, tokio sleeper,
    /// [`LogSink`] telemetry.
    pub fn builder(config: QueueConfig) -> EventQueueBuilder<LogSink> {
        EventQueueBuilder {
            config,
            transport: None,
            sleeper: Arc::new(TokioSleeper),
            sink: LogSink,
        }
    }
}

impl<S> EventQueue<S>
where
    S: TelemetrySink,
    S::Future: Send + 'static,
{
    /// Append an event. Spawns a flush when the buffer reaches `max_queue_size`.
    ///
    /// Events enqueued after [`shutdown`](Self::shutdown) are discarded.
    pub fn enqueue(&self, event: QueuedEvent) {
        let flush_now = {
            let mut state = self.shared.lock();
            if state.shut_down {
                state.dropped += 1;
                debug!(event = event.event(), "queue shut down; discarding event");
                return;
            }
            state.buffer.push_back(event);
            state.buffer.len() >= self.shared.config.max_queue_size && !state.in_flight
        };
        if flush_now {
            trace!(max_queue_size = self.shared.config.max_queue_size, "buffer full, flushing early");
            self.shared.runtime.spawn(Shared::flush(self.shared.clone(), FlushTrigger::Capacity));
        }
    }

    /// Send the buffer now unless a flush is already in flight.
    pub async fn flush(&self) {
        Shared::flush(self.shared.clone(), FlushTrigger::Manual).await;
    }

    /// Stop the timer and force one final flush of everything still buffered.
    ///
    /// The forced flush ignores an in-flight flush. A failure at this point is terminal: the batch
    /// is reported dropped since nothing will be left to retry it. The same holds for a flush that
    /// was already in flight and fails after shutdown. Idempotent.
    pub async fn shutdown(&self) {
        let ticker = self.ticker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(ticker) = ticker {
            ticker.abort();
        }
        self.shared.lock().shut_down = true;
        Shared::flush(self.shared.clone(), FlushTrigger::Shutdown).await;
    }
}

impl<S> EventQueue<S> {
    pub fn stats(&self) -> QueueStats {
        self.shared.stats()
    }

    pub fn pending(&self) -> usize {
        self.shared.lock().buffer.len()
    }

    /// Copy of the buffered events, front first.
    pub fn pending_events(&self) -> Vec<QueuedEvent> {
        self.shared.lock().buffer.iter().cloned().collect()
    }

    pub fn retry_count(&self) -> u32 {
        self.shared.lock().retry_count
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.lock().shut_down
    }

    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }
}

impl<S> Shared<S> {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stats(&self) -> QueueStats {
        let state = self.lock();
        QueueStats {
            pending: state.buffer.len(),
            retry_count: state.retry_count,
            in_flight: state.in_flight,
            delivered: state.delivered,
            dropped: state.dropped,
            batches_sent: state.batches_sent,
        }
    }
}

impl<S> Shared<S>
where
    S: TelemetrySink,
    S::Future: Send + 'static,
{
    async fn emit(&self, event: QueueEvent) {
        emit_best_effort(self.sink.clone(), event).await;
    }

    async fn flush(self: Arc<Self>, trigger: FlushTrigger) {
        let batch: Vec<QueuedEvent> = {
            let mut state = self.lock();
            if state.buffer.is_empty() {
                return;
            }
            if state.in_flight && !trigger.is_forced() {
                trace!(%trigger, "flush already in flight; skipping");
                return;
            }
            if !trigger.is_forced() {
                state.in_flight = true;
            }
            state.batches_sent += 1;
            state.buffer.drain(..).collect()
        };

        let size = batch.len();
        debug!(batch_size = size, %trigger, "flushing analytics batch");
        self.emit(QueueEvent::Sending { size, trigger }).await;

        match self.transport.send(&batch).await {
            Ok(()) => {
                {
                    let mut state = self.lock();
                    state.retry_count = 0;
                    state.delivered += size as u64;
                    if !trigger.is_forced() {
                        state.in_flight = false;
                    }
                }
                debug!(batch_size = size, "analytics batch delivered");
                self.emit(QueueEvent::Delivered { size }).await;
            }
            Err(err) => self.handle_failure(batch, err, trigger).await,
        }
    }

    async fn handle_failure(self: Arc<Self>, batch: Vec<QueuedEvent>, err: SendError, trigger: FlushTrigger) {
        let size = batch.len();
        let rate_limited = err.is_rate_limited();

        let (disposition, batch) = {
            let mut state = self.lock();
            if !trigger.is_forced() {
                state.in_flight = false;
            }
            if trigger.is_forced() || state.shut_down {
                state.dropped += size as u64;
                (Disposition::Dropped { reason: DropReason::Shutdown }, None)
            } else {
                state.retry_count += 1;
                let retry_count = state.retry_count;
                if retry_count > self.config.max_retries {
                    state.retry_count = 0;
                    state.dropped += size as u64;
                    (Disposition::Dropped { reason: DropReason::RetriesExhausted { attempts: retry_count } }, None)
                } else if rate_limited || self.config.backoff_on_failure {
                    let delay = self.config.jitter.apply(self.backoff.delay(retry_count));
                    (Disposition::Delayed { retry_count, delay }, Some(batch))
                } else {
                    state.reinsert_front(batch);
                    (Disposition::Requeued { retry_count }, None)
                }
            }
        };

        match disposition {
            Disposition::Dropped { reason } => {
                error!(batch_size = size, error = %err, %reason, "dropping analytics batch");
                self.emit(QueueEvent::Dropped { size, reason }).await;
            }
            Disposition::Requeued { retry_count } => {
                warn!(batch_size = size, retry_count, error = %err, "analytics batch failed; requeued");
                self.emit(QueueEvent::Retrying { size, retry_count, delay: Duration::ZERO, rate_limited })
                    .await;
            }
            Disposition::Delayed { retry_count, delay } => {
                warn!(
                    batch_size = size,
                    retry_count,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "analytics batch failed; backing off"
                );
                self.emit(QueueEvent::Retrying { size, retry_count, delay, rate_limited }).await;
                if let Some(batch) = batch {
                    let wait = self.sleeper.sleep(delay);
                    let shared = self.clone();
                    self.runtime.spawn(async move {
                        wait.await;
                        shared.requeue_after_backoff(batch).await;
                    });
                }
            }
        }
    }

    async fn requeue_after_backoff(&self, batch: Vec<QueuedEvent>) {
        let size = batch.len();
        let shut_down = {
            let mut state = self.lock();
            if state.shut_down {
                state.dropped += size as u64;
                true
            } else {
                state.reinsert_front(batch);
                false
            }
        };
        if shut_down {
            error!(batch_size = size, "queue shut down during backoff; dropping analytics batch");
            self.emit(QueueEvent::Dropped { size, reason: DropReason::Shutdown }).await;
        } else {
            trace!(batch_size = size, "backed-off batch reinserted at front");
        }
    }
}

async fn run_ticker<S>(shared: Weak<Shared<S>>, period: Duration)
where
    S: TelemetrySink,
    S::Future: Send + 'static,
{
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let Some(shared) = shared.upgrade() else {
            trace!("event queue dropped; stopping flush timer");
            return;
        };
        let runtime = shared.runtime.clone();
        runtime.spawn(Shared::flush(shared, FlushTrigger::Timer));
    }
}

/// Builder for [`EventQueue`].
pub struct EventQueueBuilder<S> {
    config: QueueConfig,
    transport: Option<Arc<dyn Transport>>,
    sleeper: Arc<dyn Sleeper>,
    sink: S,
}

impl<S> EventQueueBuilder<S>
where
    S: TelemetrySink,
    S::Future: Send + 'static,
{
    /// Deliver batches through `transport` instead of HTTP.
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Schedule backoff delays through `sleeper`.
    pub fn sleeper<Z: Sleeper + 'static>(mut self, sleeper: Z) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// Report lifecycle events to `sink`.
    pub fn telemetry<S2>(self, sink: S2) -> EventQueueBuilder<S2>
    where
        S2: TelemetrySink,
        S2::Future: Send + 'static,
    {
        EventQueueBuilder {
            config: self.config,
            transport: self.transport,
            sleeper: self.sleeper,
            sink,
        }
    }

    /// Validate the configuration and start the flush timer on the current tokio runtime.
    pub fn start(self) -> Result<EventQueue<S>, QueueError> {
        self.config.validate()?;
        let runtime = Handle::try_current().map_err(|_| QueueError::NoRuntime)?;
        let backoff = self.config.backoff()?;
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::from_config(&self.config)?),
        };
        let period = self.config.flush_interval;

        let shared = Arc::new(Shared {
            config: self.config,
            backoff,
            transport,
            sleeper: self.sleeper,
            sink: self.sink,
            runtime: runtime.clone(),
            state: Mutex::new(QueueState::default()),
        });
        let ticker = runtime.spawn(run_ticker(Arc::downgrade(&shared), period));
        debug!(
            flush_interval_ms = period.as_millis() as u64,
            max_queue_size = shared.config.max_queue_size,
            max_retries = shared.config.max_retries,
            "analytics queue started"
        );

        Ok(EventQueue { shared, ticker: Arc::new(Mutex::new(Some(ticker))) })
    }
}
