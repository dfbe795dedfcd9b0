/// Resilient dispatcher - routes named operations through the recovery stack
///
/// Every `dispatch` goes through the same pipeline:
///
/// 1. resolve the name (aliases included) in the registry
/// 2. run attempts under the retry executor; each attempt first passes the
///    provider's circuit gate, then the failure-injection seam, then the call
///    (with a deadline when one is configured)
/// 3. report each attempt's outcome to the provider's circuit breaker
/// 4. on a permanent error, an open circuit or an exhausted retry budget,
///    resolve through the fallback chain
///
/// Every registered operation has a documented default, so the caller only
/// sees an error for routing misses.
use super::circuit_breaker::{
    CircuitBreakerRegistry, CircuitConfig, CircuitSnapshot, CircuitStats,
};
use super::classification::{ErrorClass, ErrorClassifier};
use super::clock::{Clock, SystemClock};
use super::mechanisms::{
    BatchCall, DegradationReport, FailureInjector, FallbackResolver, GracefulDegradation,
    InjectedFailure, ValueSource,
};
use super::operation_log::{OperationLog, OperationLogEntry, MAX_ARGS_CHARS};
use super::retry::{RetryExecutor, RetryPolicy, RetryStats};
use super::timeout::with_timeout;
use crate::registry::{Operation, OperationRegistry};
use crate::value::args;
use crate::{DispatchConfig, OperationError, OperationResult, Value};
use serde::Serialize;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A dispatched value and the path that produced it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dispatched {
    pub value: Value,
    pub source: ValueSource,
}

#[derive(Debug, Default)]
struct DispatchCounters {
    total: AtomicU64,
    primary: AtomicU64,
    fallback: AtomicU64,
    default: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DispatchStats {
    pub total: u64,
    pub primary: u64,
    pub fallback: u64,
    pub default: u64,
    pub failed: u64,
}

/// Aggregated in-process counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchMetrics {
    pub dispatches: DispatchStats,
    pub retry: RetryStats,
    pub circuit: CircuitStats,
}

pub struct ResilientDispatcher {
    /// Identifier for this dispatcher instance (appears in logs)
    id: String,
    registry: OperationRegistry,
    executor: RetryExecutor,
    circuits: CircuitBreakerRegistry,
    fallbacks: FallbackResolver,
    injector: FailureInjector,
    log: OperationLog,
    policy: RetryPolicy,
    timeout: Option<Duration>,
    counters: DispatchCounters,
}

impl ResilientDispatcher {
    /// Dispatcher on real time
    pub fn new(registry: OperationRegistry, config: &DispatchConfig) -> OperationResult<Self> {
        Self::with_clock(registry, config, Arc::new(SystemClock))
    }

    /// Dispatcher on an injected clock (tests use `ManualClock`)
    pub fn with_clock(
        registry: OperationRegistry,
        config: &DispatchConfig,
        clock: Arc<dyn Clock>,
    ) -> OperationResult<Self> {
        let policy = RetryPolicy::try_from(&config.retry)?;
        let circuit_config = CircuitConfig::try_from(&config.circuit)?;
        let id = uuid::Uuid::new_v4().to_string();

        tracing::debug!(
            dispatcher = %id,
            operations = registry.len(),
            max_retries = policy.max_retries(),
            failure_threshold = circuit_config.failure_threshold,
            "Dispatcher created"
        );

        Ok(Self {
            id,
            registry,
            executor: RetryExecutor::new(ErrorClassifier::new(), Arc::clone(&clock)),
            circuits: CircuitBreakerRegistry::new(circuit_config, clock),
            fallbacks: FallbackResolver::new(),
            injector: FailureInjector::new(),
            log: OperationLog::new(config.operation_log_capacity),
            policy,
            timeout: config.operation_timeout(),
            counters: DispatchCounters::default(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Dispatch `name` with full resilience and report where the value came from
    pub fn dispatch(&self, name: &str, args: &[Value]) -> OperationResult<Dispatched> {
        self.counters.total.fetch_add(1, Ordering::Relaxed);

        let operation = match self.registry.resolve(name) {
            Ok(operation) => operation,
            Err(error) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                self.record_log(name, None, args, None, Some(error.to_string()));
                return Err(error);
            }
        };

        tracing::debug!(
            dispatcher = %self.id,
            operation = operation.name(),
            provider = operation.provider_id(),
            "Dispatching"
        );

        let outcome = self
            .executor
            .execute(&self.policy, || self.attempt(&operation, args));

        let (dispatched, reason) = match outcome {
            Ok(value) => (
                Dispatched {
                    value,
                    source: ValueSource::Primary,
                },
                None,
            ),
            Err(primary_error) => {
                let (value, source) = self.fallbacks.resolve(&operation, args, &primary_error);
                // The primary error text is kept in the log when the chain answered
                (Dispatched { value, source }, Some(primary_error.to_string()))
            }
        };

        self.count_source(dispatched.source);
        self.record_log(
            operation.name(),
            Some(operation.provider_id()),
            args,
            Some(dispatched.source),
            reason,
        );
        Ok(dispatched)
    }

    /// Route and call once: no retry, no circuit breaker, no fallback.
    /// Injected failures still apply.
    pub fn dispatch_raw(&self, name: &str, args: &[Value]) -> OperationResult<Value> {
        let operation = self.registry.resolve(name)?;

        let result = match self.injector.take(operation.name()) {
            Some(injected) => Err(injected),
            None => self.invoke(&operation, args),
        };

        self.record_log(
            operation.name(),
            Some(operation.provider_id()),
            args,
            result.as_ref().ok().map(|_| ValueSource::Primary),
            result.as_ref().err().map(|e| e.to_string()),
        );
        result
    }

    /// One attempt: circuit gate, injection seam, call, outcome report
    fn attempt(&self, operation: &Operation, args: &[Value]) -> OperationResult<Value> {
        let provider = operation.provider_id();

        // Rejections are not invocation failures and are not counted
        self.circuits.check(provider)?;

        let result = match self.injector.take(operation.name()) {
            Some(injected) => {
                tracing::debug!(operation = operation.name(), error = %injected, "Injected failure");
                Err(injected)
            }
            None => self.invoke(operation, args),
        };

        match &result {
            Ok(_) => self.circuits.record_success(provider),
            Err(error) => {
                tracing::debug!(
                    operation = operation.name(),
                    provider = provider,
                    error = %error,
                    "Attempt failed"
                );
                self.circuits.record_failure(provider);
            }
        }

        result
    }

    fn invoke(&self, operation: &Operation, args: &[Value]) -> OperationResult<Value> {
        match self.timeout {
            Some(deadline) => {
                let invoker = operation.invoker();
                let args = args.to_vec();
                with_timeout(deadline, move || invoker(&args))
            }
            None => panic::catch_unwind(AssertUnwindSafe(|| operation.invoke(args)))
                .unwrap_or_else(|payload| {
                    let message = panic_message(payload.as_ref());
                    tracing::warn!(
                        operation = operation.name(),
                        panic = %message,
                        "Operation panicked"
                    );
                    Err(OperationError::Transient(format!(
                        "operation '{}' panicked: {}",
                        operation.name(),
                        message
                    )))
                }),
        }
    }

    fn count_source(&self, source: ValueSource) {
        let counter = match source {
            ValueSource::Primary => &self.counters.primary,
            ValueSource::Fallback => &self.counters.fallback,
            ValueSource::Default => &self.counters.default,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_log(
        &self,
        operation: &str,
        provider: Option<&str>,
        call_args: &[Value],
        source: Option<ValueSource>,
        error: Option<String>,
    ) {
        self.log.record(OperationLogEntry {
            operation: operation.to_string(),
            provider: provider.map(str::to_string),
            args: args::summarize(call_args, MAX_ARGS_CHARS),
            source,
            error,
            timestamp: chrono::Utc::now(),
        });
    }

    /// Install (or replace) an explicit fallback; aliases are accepted
    pub fn register_fallback<F>(&self, name: &str, fallback: F) -> OperationResult<()>
    where
        F: Fn(&[Value]) -> OperationResult<Value> + Send + Sync + 'static,
    {
        let operation = self.registry.resolve(name)?;
        self.fallbacks.register(operation.name(), fallback);
        Ok(())
    }

    /// Force the next `count` attempts of `name` to fail with `kind`
    pub fn inject_failure(&self, name: &str, kind: ErrorClass, count: u32) -> OperationResult<()> {
        let operation = self.registry.resolve(name)?;
        self.injector.inject(operation.name(), kind, count);
        Ok(())
    }

    pub fn reset_injections(&self) {
        self.injector.reset();
    }

    pub fn injections(&self) -> BTreeMap<String, InjectedFailure> {
        self.injector.injections()
    }

    /// Run a labelled batch; failures are collected, never propagated
    pub fn execute_batch(&self, calls: &BTreeMap<String, BatchCall>) -> DegradationReport {
        GracefulDegradation::execute_batch(calls, |name, args| self.dispatch(name, args))
    }

    pub fn list_operations(&self) -> Vec<String> {
        self.registry.list()
    }

    pub fn list_aliases(&self) -> BTreeMap<String, String> {
        self.registry.list_aliases()
    }

    pub fn list_by_provider(&self) -> BTreeMap<String, Vec<String>> {
        self.registry.list_by_provider()
    }

    pub fn describe(&self, name: &str) -> OperationResult<String> {
        self.registry.describe(name)
    }

    pub fn circuit_states(&self) -> BTreeMap<String, CircuitSnapshot> {
        self.circuits.states()
    }

    pub fn circuit_state(&self, provider: &str) -> CircuitSnapshot {
        self.circuits.state(provider)
    }

    pub fn reset_circuit(&self, provider: &str) -> bool {
        self.circuits.reset(provider)
    }

    pub fn reset_all_circuits(&self) {
        self.circuits.reset_all();
    }

    pub fn configure_circuit(&self, provider: &str, config: CircuitConfig) {
        self.circuits.configure(provider, config);
    }

    pub fn metrics(&self) -> DispatchMetrics {
        DispatchMetrics {
            dispatches: DispatchStats {
                total: self.counters.total.load(Ordering::Relaxed),
                primary: self.counters.primary.load(Ordering::Relaxed),
                fallback: self.counters.fallback.load(Ordering::Relaxed),
                default: self.counters.default.load(Ordering::Relaxed),
                failed: self.counters.failed.load(Ordering::Relaxed),
            },
            retry: self.executor.metrics().snapshot(),
            circuit: self.circuits.metrics().snapshot(),
        }
    }

    /// Most recent dispatches, oldest first
    pub fn operation_log(&self) -> Vec<OperationLogEntry> {
        self.log.entries()
    }

    pub fn clear_operation_log(&self) {
        self.log.clear();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
