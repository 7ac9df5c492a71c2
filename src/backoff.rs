//! Exponential backoff schedule for retried batches.
//!
//! `retry_count` is the queue's retry counter *after* it has been incremented for the current
//! failure, so the first retry uses `delay(1) == base`, the second `2 * base`, and so on,
//! saturating at the configured cap. `delay(0)` is zero (nothing to back off from).
//!
//! ```rust
//! use std::time::Duration;
//! use digiclick_telemetry::Backoff;
//!
//! let backoff = Backoff::exponential(Duration::from_millis(1000))
//!     .with_max(Duration::from_secs(30))
//!     .unwrap();
//! assert_eq!(backoff.delay(1), Duration::from_millis(1000));
//! assert_eq!(backoff.delay(3), Duration::from_millis(4000));
//! assert_eq!(backoff.delay(9), Duration::from_secs(30)); // capped
//! ```
//!
//! Overflow behavior: multipliers that would overflow saturate to [`MAX_BACKOFF`] (1 day).

use std::time::Duration;
use thiserror::Error;

/// Maximum delay used when calculations overflow (1 day).
pub const MAX_BACKOFF: Duration = Duration::from_secs(24 * 60 * 60);

/// Default first-retry delay.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(1000);

/// Default upper bound on any single delay.
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_millis(30_000);

/// Errors returned by backoff configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackoffError {
    #[error("max must be greater than zero")]
    MaxMustBePositive,
    #[error("max ({max:?}) must be >= base ({base:?})")]
    MaxLessThanBase { base: Duration, max: Duration },
}

/// Doubling delay with an optional cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Option<Duration>,
}

impl Backoff {
    /// Uncapped exponential backoff starting at `base`.
    pub fn exponential(base: Duration) -> Self {
        Self { base, max: None }
    }

    /// Cap every delay at `max`. Rejects a zero cap or one below `base`.
    pub fn with_max(mut self, max: Duration) -> Result<Self, BackoffError> {
        if max.is_zero() {
            return Err(BackoffError::MaxMustBePositive);
        }
        if max < self.base {
            return Err(BackoffError::MaxLessThanBase { base: self.base, max });
        }
        self.max = Some(max);
        Ok(self)
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn max(&self) -> Option<Duration> {
        self.max
    }

    /// Delay before re-sending a batch whose failure pushed the retry counter to `retry_count`.
    pub fn delay(&self, retry_count: u32) -> Duration {
        if retry_count == 0 {
            return Duration::ZERO;
        }
        let multiplier = 2u128.saturating_pow(retry_count - 1);
        let nanos = self.base.as_nanos().saturating_mul(multiplier);
        let delay = Duration::from_nanos(nanos.min(MAX_BACKOFF.as_nanos()) as u64);
        self.max.map(|m| delay.min(m)).unwrap_or(delay).min(MAX_BACKOFF)
    }
}

impl Default for Backoff {
    /// 1 s doubling, capped at 30 s.
    fn default() -> Self {
        Self { base: DEFAULT_BACKOFF_BASE, max: Some(DEFAULT_BACKOFF_MAX) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_doubles_from_one_second_and_caps_at_thirty() {
        let backoff = Backoff::default();
        let delays: Vec<u128> = (1..=7).map(|n| backoff.delay(n).as_millis()).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000, 30000, 30000]);
    }

    #[test]
    fn zero_retry_count_has_no_delay() {
        assert_eq!(Backoff::default().delay(0), Duration::ZERO);
    }

    #[test]
    fn uncapped_backoff_saturates_at_max_backoff() {
        let backoff = Backoff::exponential(Duration::from_secs(1));
        assert_eq!(backoff.delay(u32::MAX), MAX_BACKOFF);
        assert_eq!(backoff.delay(200), MAX_BACKOFF);
    }

    #[test]
    fn with_max_rejects_zero() {
        let err = Backoff::exponential(Duration::from_millis(10)).with_max(Duration::ZERO);
        assert_eq!(err, Err(BackoffError::MaxMustBePositive));
    }

    #[test]
    fn with_max_rejects_cap_below_base() {
        let err = Backoff::exponential(Duration::from_secs(5))
            .with_max(Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, BackoffError::MaxLessThanBase { .. }));
    }

    #[test]
    fn zero_base_never_delays() {
        let backoff = Backoff::exponential(Duration::ZERO);
        assert_eq!(backoff.delay(3), Duration::ZERO);
    }
}
