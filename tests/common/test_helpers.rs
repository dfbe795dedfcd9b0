#![allow(dead_code)]

/// Common test helper functions
use resilient_dispatch::error::ManualClock;
use resilient_dispatch::{
    providers, DefaultKind, DispatchConfig, Operation, OperationError, OperationRegistry,
    Provider, ResilientDispatcher, RetrySettings, Value,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Deterministic config: no jitter, small delays
pub fn fast_config(max_retries: u32, failure_threshold: u32) -> DispatchConfig {
    let mut config = DispatchConfig::default();
    config.retry = RetrySettings {
        max_retries,
        base_delay_ms: 10,
        max_delay_ms: 1000,
        jitter: false,
    };
    config.circuit.failure_threshold = failure_threshold;
    config.circuit.reset_timeout_ms = 30_000;
    config
}

/// Dispatcher over the built-in providers on a manual clock
pub fn builtin_dispatcher(config: &DispatchConfig) -> (ResilientDispatcher, Arc<ManualClock>) {
    let mut registry = OperationRegistry::new();
    providers::register_builtin(&mut registry).expect("builtin registration");
    dispatcher_with(registry, config)
}

pub fn dispatcher_with(
    registry: OperationRegistry,
    config: &DispatchConfig,
) -> (ResilientDispatcher, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let dispatcher = ResilientDispatcher::with_clock(registry, config, clock.clone())
        .expect("valid dispatcher config");
    (dispatcher, clock)
}

/// Provider whose single operation fails a scripted number of times, then succeeds
pub struct ScriptedProvider {
    id: &'static str,
    operation: &'static str,
    failures: Arc<AtomicU32>,
    calls: Arc<AtomicU32>,
    permanent: bool,
}

impl ScriptedProvider {
    pub fn new(id: &'static str, operation: &'static str) -> Self {
        Self {
            id,
            operation,
            failures: Arc::new(AtomicU32::new(0)),
            calls: Arc::new(AtomicU32::new(0)),
            permanent: false,
        }
    }

    /// Fail the next `count` real invocations
    pub fn failing(self, count: u32) -> Self {
        self.failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn permanent(mut self) -> Self {
        self.permanent = true;
        self
    }

    /// Shared handle to the invocation counter
    pub fn calls(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.calls)
    }

    /// Shared handle to the remaining-failures counter
    pub fn failures(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.failures)
    }
}

impl Provider for ScriptedProvider {
    fn id(&self) -> &'static str {
        self.id
    }

    fn operations(&self) -> Vec<Operation> {
        let failures = Arc::clone(&self.failures);
        let calls = Arc::clone(&self.calls);
        let permanent = self.permanent;
        let name = self.operation;

        vec![Operation::new(name, self.id, move |args: &[Value]| {
            calls.fetch_add(1, Ordering::SeqCst);
            let remaining = failures.load(Ordering::SeqCst);
            if remaining > 0 {
                failures.store(remaining - 1, Ordering::SeqCst);
                return Err(if permanent {
                    OperationError::Permanent(format!("{} rejected the request", name))
                } else {
                    OperationError::Transient(format!("{} unavailable", name))
                });
            }
            Ok(args.first().cloned().unwrap_or(Value::Integer(0)))
        })
        .with_default(DefaultKind::SentinelCount)]
    }
}
