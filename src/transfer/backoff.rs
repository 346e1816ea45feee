//! Backoff policy and clock for the try-lock strategy
//!
//! The clock is injectable so tests drive retries on virtual time instead
//! of wall-clock sleeps.

use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::cancel::CancelToken;

/// Default retry budget for the try-lock strategy
pub const DEFAULT_MAX_RETRIES: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    /// Same delay every round
    Fixed,
    /// Delay doubles every round up to `max_delay`
    Exponential,
}

/// How long to wait between try-lock rounds and when to give up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub kind: BackoffKind,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// `None` retries until cancelled (or the deadline passes)
    pub max_retries: Option<u32>,
    /// Wall time budget measured from the first attempt
    pub deadline: Option<Duration>,
    /// Draw each delay uniformly from `[delay / 2, delay]`
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            kind: BackoffKind::Exponential,
            initial_delay: Duration::from_micros(50),
            max_delay: Duration::from_millis(10),
            max_retries: Some(DEFAULT_MAX_RETRIES),
            deadline: None,
            jitter: true,
        }
    }
}

impl BackoffPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self {
            kind: BackoffKind::Fixed,
            initial_delay: delay,
            max_delay: delay,
            jitter: false,
            ..Default::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: Option<u32>) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Upper bound of the delay before retry number `retry` (1-based).
    pub fn base_delay(&self, retry: u32) -> Duration {
        match self.kind {
            BackoffKind::Fixed => self.initial_delay,
            BackoffKind::Exponential => {
                let shift = retry.saturating_sub(1).min(31);
                self.initial_delay
                    .checked_mul(1u32 << shift)
                    .unwrap_or(self.max_delay)
                    .min(self.max_delay)
            }
        }
    }

    /// Delay to sleep before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let base = self.base_delay(retry);
        if !self.jitter || base.is_zero() {
            return base;
        }
        let nanos = base.as_nanos().min(u64::MAX as u128) as u64;
        Duration::from_nanos(rand::thread_rng().gen_range(nanos / 2..=nanos))
    }

    /// True once `retries` rounds or `elapsed` time exceed the budget.
    pub fn is_exhausted(&self, retries: u32, elapsed: Duration) -> bool {
        self.max_retries.is_some_and(|max| retries >= max)
            || self.deadline.is_some_and(|deadline| elapsed >= deadline)
    }
}

/// Time source and sleeper used between try-lock rounds.
pub trait BackoffClock: Send + Sync {
    fn now(&self) -> Instant;

    /// Sleep for `duration`; returns `false` if `cancel` fired first.
    fn sleep(&self, duration: Duration, cancel: &CancelToken) -> bool;
}

/// Real time: sleeps on the cancel token's condition variable.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl BackoffClock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration, cancel: &CancelToken) -> bool {
        cancel.sleep(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_delay() {
        let policy = BackoffPolicy::fixed(Duration::from_millis(10));
        assert_eq!(policy.delay_for(1), Duration::from_millis(10));
        assert_eq!(policy.delay_for(50), Duration::from_millis(10));
    }

    #[test]
    fn test_exponential_delay_is_capped() {
        let policy = BackoffPolicy::default().with_jitter(false);
        assert_eq!(policy.delay_for(1), Duration::from_micros(50));
        assert_eq!(policy.delay_for(2), Duration::from_micros(100));
        assert_eq!(policy.delay_for(3), Duration::from_micros(200));
        assert_eq!(policy.delay_for(20), Duration::from_millis(10));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_millis(10));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = BackoffPolicy::default();
        for retry in 1..30 {
            let base = policy.base_delay(retry);
            let delay = policy.delay_for(retry);
            assert!(delay <= base);
            assert!(delay >= base / 2);
        }
    }

    #[test]
    fn test_retry_budget() {
        let policy = BackoffPolicy::default().with_max_retries(Some(3));
        assert!(!policy.is_exhausted(2, Duration::ZERO));
        assert!(policy.is_exhausted(3, Duration::ZERO));

        let unbounded = BackoffPolicy::default().with_max_retries(None);
        assert!(!unbounded.is_exhausted(u32::MAX, Duration::from_secs(3600)));
    }

    #[test]
    fn test_deadline_budget() {
        let policy = BackoffPolicy::default()
            .with_max_retries(None)
            .with_deadline(Some(Duration::from_millis(100)));
        assert!(!policy.is_exhausted(1_000_000, Duration::from_millis(99)));
        assert!(policy.is_exhausted(1, Duration::from_millis(100)));
    }

    #[test]
    fn test_system_clock_honours_cancel() {
        let clock = SystemClock;
        let token = CancelToken::new();
        assert!(clock.sleep(Duration::from_millis(1), &token));
        token.cancel();
        assert!(!clock.sleep(Duration::from_secs(10), &token));
    }
}
