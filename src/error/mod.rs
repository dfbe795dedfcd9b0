/// Fault-tolerance layer for operation dispatch
///
/// This module wraps every operation call in a uniform recovery policy:
/// - Tag-driven error classification (Transient / Permanent)
/// - Retry with bounded exponential backoff and jitter
/// - Per-provider circuit breakers
/// - Per-attempt deadlines
/// - Fallback chain (explicit fallback, then documented default)
/// - Batch-level graceful degradation
/// - Deterministic failure injection
///
/// # Architecture
///
/// ```text
/// ┌─────────────────────────────────────────┐
/// │       Resilient Dispatcher (facade)     │
/// └────────────────┬────────────────────────┘
///                  │
///      ┌───────────┴───────────┐
///      ↓                       ↓
/// ┌──────────────┐      ┌──────────────┐
/// │Classification│      │   Circuit    │
/// │   & Retry    │      │   Breakers   │
/// └─────┬────────┘      └──────────────┘
///       │
///       ↓
/// ┌─────────────────────────────────────┐
/// │     Recovery Mechanisms             │
/// │  - Fallback Resolver                │
/// │  - Graceful Degradation             │
/// │  - Failure Injector                 │
/// └─────────────────────────────────────┘
/// ```
///
/// # Usage Example
///
/// ```rust,ignore
/// use resilient_dispatch::{providers, DispatchConfig, OperationRegistry, ResilientDispatcher};
///
/// let mut registry = OperationRegistry::new();
/// providers::register_builtin(&mut registry)?;
///
/// let dispatcher = ResilientDispatcher::new(registry, &DispatchConfig::default())?;
/// let result = dispatcher.dispatch("add", &[2.0.into(), 3.0.into()])?;
/// println!("{} (from {})", result.value, result.source);
/// # Ok::<(), anyhow::Error>(())
/// ```

pub mod circuit_breaker;
pub mod classification;
pub mod clock;
pub mod dispatcher;
pub mod mechanisms;
pub mod operation_log;
pub mod retry;
pub mod timeout;

// Re-export main types for convenience
pub use circuit_breaker::{
    CircuitBreakerRegistry, CircuitConfig, CircuitSnapshot, CircuitState, CircuitStats,
};
pub use classification::{ErrorClass, ErrorClassifier};
pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatcher::{DispatchMetrics, DispatchStats, Dispatched, ResilientDispatcher};
pub use operation_log::{OperationLog, OperationLogEntry};
pub use retry::{RetryExecutor, RetryMetrics, RetryPolicy, RetryStats};
pub use timeout::with_timeout;
