//! Queue configuration.
//!
//! Every tunable lives in [`QueueConfig`]. It can be assembled in code through
//! [`QueueConfig::builder`] or loaded from JSON, where durations are spelled in milliseconds:
//!
//! ```json
//! {
//!   "endpoint": "https://digiclick.ai/api/analytics/events",
//!   "flush_interval_ms": 1000,
//!   "max_queue_size": 50,
//!   "max_retries": 3,
//!   "backoff_base_ms": 1000,
//!   "backoff_max_ms": 30000,
//!   "request_timeout_ms": 10000,
//!   "backoff_on_failure": false,
//!   "jitter": "none"
//! }
//! ```
//!
//! Omitted keys take their defaults. Both paths validate before a queue ever sees the values.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::backoff::{Backoff, DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_MAX};
use crate::error::ConfigError;
use crate::jitter::Jitter;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000/api/analytics/events";
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 50;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Tunables for an [`EventQueue`](crate::EventQueue).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueConfig {
    /// Collection endpoint receiving `POST` batches.
    pub endpoint: String,
    /// Period of the background flush timer.
    #[serde(rename = "flush_interval_ms", with = "millis")]
    pub flush_interval: Duration,
    /// Pending count at which `enqueue` triggers a flush without waiting for the timer.
    pub max_queue_size: usize,
    /// Failed sends tolerated before a batch is dropped.
    pub max_retries: u32,
    #[serde(rename = "backoff_base_ms", with = "millis")]
    pub backoff_base: Duration,
    #[serde(rename = "backoff_max_ms", with = "millis")]
    pub backoff_max: Duration,
    /// Per-request timeout for the HTTP transport.
    #[serde(rename = "request_timeout_ms", with = "millis")]
    pub request_timeout: Duration,
    /// Delay non-429 failures by the backoff schedule too, instead of retrying on the next tick.
    pub backoff_on_failure: bool,
    pub jitter: Jitter,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_max: DEFAULT_BACKOFF_MAX,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            backoff_on_failure: false,
            jitter: Jitter::None,
        }
    }
}

impl QueueConfig {
    pub fn builder() -> QueueConfigBuilder {
        QueueConfigBuilder::default()
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every invariant the queue relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_queue_size == 0 {
            return Err(ConfigError::ZeroQueueSize);
        }
        if self.flush_interval.is_zero() {
            return Err(ConfigError::ZeroFlushInterval);
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroRequestTimeout);
        }
        self.endpoint_url()?;
        self.backoff()?;
        Ok(())
    }

    /// The endpoint as a parsed URL; only `http` and `https` are accepted.
    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidEndpoint {
            endpoint: self.endpoint.clone(),
            reason,
        };
        let url = Url::parse(&self.endpoint).map_err(|e| invalid(e.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(invalid(format!("unsupported scheme {other:?}"))),
        }
    }

    /// Backoff schedule described by `backoff_base` / `backoff_max`.
    pub fn backoff(&self) -> Result<Backoff, ConfigError> {
        Ok(Backoff::exponential(self.backoff_base).with_max(self.backoff_max)?)
    }
}

/// Builder for [`QueueConfig`]; starts from the defaults.
#[derive(Debug, Clone, Default)]
pub struct QueueConfigBuilder {
    config: QueueConfig,
}

impl QueueConfigBuilder {
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.config.flush_interval = interval;
        self
    }

    pub fn max_queue_size(mut self, size: usize) -> Self {
        self.config.max_queue_size = size;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn backoff(mut self, base: Duration, max: Duration) -> Self {
        self.config.backoff_base = base;
        self.config.backoff_max = max;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn backoff_on_failure(mut self, enabled: bool) -> Self {
        self.config.backoff_on_failure = enabled;
        self
    }

    pub fn jitter(mut self, jitter: Jitter) -> Self {
        self.config.jitter = jitter;
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<QueueConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis().try_into().unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::BackoffError;

    #[test]
    fn defaults_match_documented_constants() {
        let cfg = QueueConfig::default();
        assert_eq!(cfg.flush_interval, Duration::from_millis(1000));
        assert_eq!(cfg.max_queue_size, 50);
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.backoff_base, Duration::from_millis(1000));
        assert_eq!(cfg.backoff_max, Duration::from_millis(30_000));
        assert!(!cfg.backoff_on_failure);
        assert_eq!(cfg.jitter, Jitter::None);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn builder_rejects_zero_queue_size() {
        let err = QueueConfig::builder().max_queue_size(0).build().unwrap_err();
        assert!(matches!(err, ConfigError::ZeroQueueSize));
    }

    #[test]
    fn builder_rejects_zero_interval() {
        let err = QueueConfig::builder().flush_interval(Duration::ZERO).build().unwrap_err();
        assert!(matches!(err, ConfigError::ZeroFlushInterval));
    }

    #[test]
    fn builder_rejects_backoff_cap_below_base() {
        let err = QueueConfig::builder()
            .backoff(Duration::from_secs(5), Duration::from_secs(1))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Backoff(BackoffError::MaxLessThanBase { .. })));
    }

    #[test]
    fn endpoint_must_be_http() {
        let err = QueueConfig::builder().endpoint("ftp://example.com/x").build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEndpoint { .. }));

        let err = QueueConfig::builder().endpoint("/api/analytics").build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEndpoint { .. }));
    }

    #[test]
    fn zero_retries_is_allowed() {
        let cfg = QueueConfig::builder().max_retries(0).build().unwrap();
        assert_eq!(cfg.max_retries, 0);
    }

    #[test]
    fn json_fills_missing_keys_with_defaults() {
        let cfg = QueueConfig::from_json_str(
            r#"{ "endpoint": "https://digiclick.ai/api/analytics/events", "flush_interval_ms": 250, "jitter": "full" }"#,
        )
        .unwrap();
        assert_eq!(cfg.flush_interval, Duration::from_millis(250));
        assert_eq!(cfg.max_queue_size, DEFAULT_MAX_QUEUE_SIZE);
        assert_eq!(cfg.jitter, Jitter::Full);
    }

    #[test]
    fn json_is_validated() {
        let err = QueueConfig::from_json_str(r#"{ "max_queue_size": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroQueueSize));
    }

    #[test]
    fn json_rejects_unknown_keys() {
        let err = QueueConfig::from_json_str(r#"{ "flush_every": 5 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn json_round_trips_millisecond_fields() {
        let cfg = QueueConfig::builder().request_timeout(Duration::from_millis(2500)).build().unwrap();
        let v = serde_json::to_value(&cfg).unwrap();
        assert_eq!(v["request_timeout_ms"], 2500);
        assert_eq!(v["backoff_max_ms"], 30000);
    }
}
