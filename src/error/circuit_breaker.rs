/// Per-provider circuit breakers
///
/// Each provider id gets its own three-state breaker:
///
/// ```text
///   CLOSED ──(failures >= threshold)──▶ OPEN
///     ▲                                  │
///     │                           (reset_timeout elapsed,
///  (trial ok)                      next check admits one trial)
///     │                                  ▼
///     └────────────── HALF_OPEN ──(trial fails)──▶ OPEN
/// ```
///
/// A failing provider never affects another provider's breaker. While a
/// breaker is OPEN, `check` rejects with `CircuitOpen` and the operation is
/// never invoked. Time is read from the injected [`Clock`].
use super::clock::{Clock, SystemClock};
use crate::{CircuitSettings, OperationError, OperationResult};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation
    Closed,

    /// Too many failures, fail fast
    Open,

    /// Testing whether the provider recovered
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,

    /// Time spent OPEN before a trial call is admitted
    pub reset_timeout: Duration,
}

impl CircuitConfig {
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> OperationResult<Self> {
        if failure_threshold == 0 {
            return Err(OperationError::Validation(
                "failure_threshold must be > 0".to_string(),
            ));
        }
        Ok(Self {
            failure_threshold,
            reset_timeout,
        })
    }
}

impl Default for CircuitConfig {
    fn default() -> Self {
        let settings = CircuitSettings::default();
        Self {
            failure_threshold: settings.failure_threshold,
            reset_timeout: Duration::from_millis(settings.reset_timeout_ms),
        }
    }
}

impl TryFrom<&CircuitSettings> for CircuitConfig {
    type Error = OperationError;

    fn try_from(settings: &CircuitSettings) -> OperationResult<Self> {
        Self::new(
            settings.failure_threshold,
            Duration::from_millis(settings.reset_timeout_ms),
        )
    }
}

#[derive(Debug)]
struct CircuitRecord {
    state: CircuitState,
    consecutive_failures: u32,
    config: CircuitConfig,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

impl CircuitRecord {
    fn new(config: CircuitConfig) -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            config,
            opened_at: None,
            trial_in_flight: false,
        }
    }

    fn open_remaining(&self, now: Instant) -> Option<Duration> {
        match (self.state, self.opened_at) {
            (CircuitState::Open, Some(opened_at)) => Some(
                self.config
                    .reset_timeout
                    .saturating_sub(now.saturating_duration_since(opened_at)),
            ),
            _ => None,
        }
    }

    fn snapshot(&self, now: Instant) -> CircuitSnapshot {
        CircuitSnapshot {
            state: self.state,
            consecutive_failures: self.consecutive_failures,
            failure_threshold: self.config.failure_threshold,
            reset_timeout_ms: self.config.reset_timeout.as_millis() as u64,
            open_remaining_ms: self.open_remaining(now).map(|d| d.as_millis() as u64),
        }
    }
}

/// Point-in-time view of one breaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
    /// Time left before a trial is admitted (OPEN only)
    pub open_remaining_ms: Option<u64>,
}

/// Transition counters
#[derive(Debug, Default)]
pub struct CircuitMetrics {
    opened: AtomicU64,
    half_opened: AtomicU64,
    closed: AtomicU64,
    rejected: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CircuitStats {
    pub opened: u64,
    pub half_opened: u64,
    pub closed: u64,
    pub rejected: u64,
}

impl CircuitMetrics {
    pub fn snapshot(&self) -> CircuitStats {
        CircuitStats {
            opened: self.opened.load(Ordering::Relaxed),
            half_opened: self.half_opened.load(Ordering::Relaxed),
            closed: self.closed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

pub struct CircuitBreakerRegistry {
    records: DashMap<String, Arc<Mutex<CircuitRecord>>>,
    defaults: CircuitConfig,
    overrides: DashMap<String, CircuitConfig>,
    clock: Arc<dyn Clock>,
    metrics: CircuitMetrics,
}

impl CircuitBreakerRegistry {
    pub fn new(defaults: CircuitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: DashMap::new(),
            defaults,
            overrides: DashMap::new(),
            clock,
            metrics: CircuitMetrics::default(),
        }
    }

    /// Use a dedicated threshold/timeout for one provider
    pub fn configure(&self, provider: &str, config: CircuitConfig) {
        self.overrides.insert(provider.to_string(), config);
        if let Some(record) = self.records.get(provider) {
            record.lock().config = config;
        }
    }

    fn record(&self, provider: &str) -> Arc<Mutex<CircuitRecord>> {
        if let Some(record) = self.records.get(provider) {
            return Arc::clone(record.value());
        }

        let config = self
            .overrides
            .get(provider)
            .map(|c| *c.value())
            .unwrap_or(self.defaults);

        Arc::clone(
            self.records
                .entry(provider.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(CircuitRecord::new(config))))
                .value(),
        )
    }

    /// Gate one call. Admits the single HALF_OPEN trial once the reset timeout elapsed.
    pub fn check(&self, provider: &str) -> OperationResult<()> {
        let record = self.record(provider);
        let mut record = record.lock();
        let now = self.clock.now();

        match record.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let remaining = record.open_remaining(now).unwrap_or(Duration::ZERO);
                if remaining.is_zero() {
                    record.state = CircuitState::HalfOpen;
                    record.trial_in_flight = true;
                    self.metrics.half_opened.fetch_add(1, Ordering::Relaxed);
                    tracing::info!(provider = provider, "Circuit transitioning to HALF_OPEN");
                    Ok(())
                } else {
                    self.metrics.rejected.fetch_add(1, Ordering::Relaxed);
                    Err(OperationError::CircuitOpen {
                        provider: provider.to_string(),
                        remaining,
                    })
                }
            }
            CircuitState::HalfOpen => {
                if record.trial_in_flight {
                    self.metrics.rejected.fetch_add(1, Ordering::Relaxed);
                    Err(OperationError::CircuitOpen {
                        provider: provider.to_string(),
                        remaining: Duration::ZERO,
                    })
                } else {
                    record.trial_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    pub fn record_success(&self, provider: &str) {
        let record = self.record(provider);
        let mut record = record.lock();

        match record.state {
            CircuitState::HalfOpen => {
                record.state = CircuitState::Closed;
                record.consecutive_failures = 0;
                record.opened_at = None;
                record.trial_in_flight = false;
                self.metrics.closed.fetch_add(1, Ordering::Relaxed);
                tracing::info!(provider = provider, "Circuit CLOSED after successful trial");
            }
            CircuitState::Closed => {
                record.consecutive_failures = 0;
            }
            CircuitState::Open => {
                // Straggler from before the circuit opened
                tracing::debug!(provider = provider, "Ignoring success while circuit is OPEN");
            }
        }
    }

    pub fn record_failure(&self, provider: &str) {
        let record = self.record(provider);
        let mut record = record.lock();
        let now = self.clock.now();

        match record.state {
            CircuitState::Closed => {
                record.consecutive_failures += 1;
                if record.consecutive_failures >= record.config.failure_threshold {
                    record.state = CircuitState::Open;
                    record.opened_at = Some(now);
                    self.metrics.opened.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        provider = provider,
                        failures = record.consecutive_failures,
                        reset_timeout = %humantime::format_duration(record.config.reset_timeout),
                        "Circuit OPEN"
                    );
                }
            }
            CircuitState::HalfOpen => {
                record.state = CircuitState::Open;
                record.consecutive_failures += 1;
                record.opened_at = Some(now);
                record.trial_in_flight = false;
                self.metrics.opened.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(provider = provider, "Trial failed, circuit OPEN again");
            }
            CircuitState::Open => {
                tracing::debug!(provider = provider, "Ignoring failure while circuit is OPEN");
            }
        }
    }

    /// Snapshot of one provider's breaker; unseen providers report CLOSED
    pub fn state(&self, provider: &str) -> CircuitSnapshot {
        let now = self.clock.now();
        match self.records.get(provider) {
            Some(record) => record.lock().snapshot(now),
            None => {
                let config = self
                    .overrides
                    .get(provider)
                    .map(|c| *c.value())
                    .unwrap_or(self.defaults);
                CircuitRecord::new(config).snapshot(now)
            }
        }
    }

    /// Every provider seen so far, sorted by id
    pub fn states(&self) -> BTreeMap<String, CircuitSnapshot> {
        let now = self.clock.now();
        self.records
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().lock().snapshot(now)))
            .collect()
    }

    /// Force a provider back to CLOSED. Returns false if it was never seen.
    pub fn reset(&self, provider: &str) -> bool {
        match self.records.get(provider) {
            Some(record) => {
                let mut record = record.lock();
                let config = record.config;
                *record = CircuitRecord::new(config);
                tracing::info!(provider = provider, "Circuit manually reset");
                true
            }
            None => false,
        }
    }

    pub fn reset_all(&self) {
        for entry in self.records.iter() {
            let mut record = entry.value().lock();
            let config = record.config;
            *record = CircuitRecord::new(config);
        }
        tracing::info!(count = self.records.len(), "All circuits reset");
    }

    pub fn metrics(&self) -> &CircuitMetrics {
        &self.metrics
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitConfig::default(), Arc::new(SystemClock))
    }
}
