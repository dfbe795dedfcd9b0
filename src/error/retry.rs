/// Retry with bounded exponential backoff and jitter
///
/// The executor repeats a call under a [`RetryPolicy`], consulting the
/// classifier after every failure. Permanent errors are returned at once;
/// transient ones are retried after `min(base * 2^attempt, max)`, optionally
/// scaled by a uniform jitter factor in `[0.5, 1.5]`. All sleeping goes
/// through the injected [`Clock`].
use super::classification::ErrorClassifier;
use super::clock::{Clock, SystemClock};
use crate::{OperationError, OperationResult, RetrySettings};
use rand::Rng;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Lower bound of the jitter factor
pub const JITTER_MIN: f64 = 0.5;

/// Upper bound of the jitter factor
pub const JITTER_MAX: f64 = 1.5;

/// Immutable per-call retry policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter: bool,
}

impl RetryPolicy {
    /// `max_retries` retries after the first attempt (`max_retries + 1` calls total)
    pub fn new(
        max_retries: u32,
        base_delay: Duration,
        max_delay: Duration,
        jitter: bool,
    ) -> OperationResult<Self> {
        if base_delay.is_zero() {
            return Err(OperationError::Validation(
                "base_delay must be > 0".to_string(),
            ));
        }
        if max_delay < base_delay {
            return Err(OperationError::Validation(format!(
                "max_delay ({}) must be >= base_delay ({})",
                humantime::format_duration(max_delay),
                humantime::format_duration(base_delay)
            )));
        }

        Ok(Self {
            max_retries,
            base_delay,
            max_delay,
            jitter,
        })
    }

    /// Exactly one attempt, no sleeping
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            jitter: false,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn jitter(&self) -> bool {
        self.jitter
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Deterministic backoff for the sleep following `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Backoff with jitter applied when enabled
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let delay = self.delay_for(attempt);
        if self.jitter {
            let factor = rand::thread_rng().gen_range(JITTER_MIN..=JITTER_MAX);
            delay.mul_f64(factor)
        } else {
            delay
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        let settings = RetrySettings::default();
        Self {
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            jitter: settings.jitter,
        }
    }
}

impl TryFrom<&RetrySettings> for RetryPolicy {
    type Error = OperationError;

    fn try_from(settings: &RetrySettings) -> OperationResult<Self> {
        RetryPolicy::new(
            settings.max_retries,
            Duration::from_millis(settings.base_delay_ms),
            Duration::from_millis(settings.max_delay_ms),
            settings.jitter,
        )
    }
}

/// In-process retry counters
#[derive(Debug, Default)]
pub struct RetryMetrics {
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    sleeps: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RetryStats {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub sleeps: u64,
}

impl RetryMetrics {
    pub fn snapshot(&self) -> RetryStats {
        RetryStats {
            attempts: self.attempts.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            sleeps: self.sleeps.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.attempts.store(0, Ordering::Relaxed);
        self.successes.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.sleeps.store(0, Ordering::Relaxed);
    }
}

pub struct RetryExecutor {
    classifier: ErrorClassifier,
    clock: Arc<dyn Clock>,
    metrics: RetryMetrics,
}

impl RetryExecutor {
    pub fn new(classifier: ErrorClassifier, clock: Arc<dyn Clock>) -> Self {
        Self {
            classifier,
            clock,
            metrics: RetryMetrics::default(),
        }
    }

    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    pub fn metrics(&self) -> &RetryMetrics {
        &self.metrics
    }

    /// Run `operation` under `policy`.
    ///
    /// Returns the first success, or the last error unchanged once the
    /// budget is spent. Permanent errors return after a single call.
    pub fn execute<T, F>(&self, policy: &RetryPolicy, mut operation: F) -> OperationResult<T>
    where
        F: FnMut() -> OperationResult<T>,
    {
        let mut attempt = 0;

        loop {
            self.metrics.attempts.fetch_add(1, Ordering::Relaxed);

            let error = match operation() {
                Ok(value) => {
                    self.metrics.successes.fetch_add(1, Ordering::Relaxed);
                    if attempt > 0 {
                        tracing::info!(attempt = attempt + 1, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let class = self.classifier.classify(&error);
            if !class.allows_retry() {
                self.metrics.failures.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    attempt = attempt + 1,
                    error = %error,
                    class = %class,
                    "Not retrying"
                );
                return Err(error);
            }

            if attempt >= policy.max_retries {
                self.metrics.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    error = %error,
                    "Max retry attempts reached"
                );
                return Err(error);
            }

            // A server-suggested delay replaces the computed backoff for this sleep only
            let delay = error
                .retry_after()
                .unwrap_or_else(|| policy.next_delay(attempt));

            tracing::debug!(
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                remaining = policy.max_retries - attempt,
                error = %error,
                "Retrying after delay"
            );

            self.metrics.sleeps.fetch_add(1, Ordering::Relaxed);
            self.clock.sleep(delay);
            attempt += 1;
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(ErrorClassifier::new(), Arc::new(SystemClock))
    }
}
