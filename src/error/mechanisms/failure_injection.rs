/// Deterministic failure injection
///
/// The only sanctioned way to force an operation to fail. Each injection
/// carries a classification and a remaining count; every triggered use
/// decrements the count and the injection removes itself at zero.
use crate::error::classification::ErrorClass;
use crate::OperationError;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InjectedFailure {
    pub kind: ErrorClass,
    pub remaining: u32,
}

#[derive(Debug, Default)]
pub struct FailureInjector {
    injections: Mutex<BTreeMap<String, InjectedFailure>>,
}

impl FailureInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` calls to `operation` with `kind`; zero clears it
    pub fn inject(&self, operation: impl Into<String>, kind: ErrorClass, count: u32) {
        let operation = operation.into();
        let mut injections = self.injections.lock();

        if count == 0 {
            injections.remove(&operation);
            return;
        }

        tracing::debug!(operation = %operation, kind = %kind, count, "Failure injected");
        injections.insert(
            operation,
            InjectedFailure {
                kind,
                remaining: count,
            },
        );
    }

    /// Consume one injected failure for `operation`, if any
    pub fn take(&self, operation: &str) -> Option<OperationError> {
        let mut injections = self.injections.lock();
        let injection = injections.get_mut(operation)?;

        injection.remaining -= 1;
        let kind = injection.kind;
        if injection.remaining == 0 {
            injections.remove(operation);
        }

        Some(match kind {
            ErrorClass::Transient => {
                OperationError::Transient(format!("Injected transient failure for {}", operation))
            }
            ErrorClass::Permanent => {
                OperationError::Permanent(format!("Injected permanent failure for {}", operation))
            }
        })
    }

    pub fn remaining(&self, operation: &str) -> u32 {
        self.injections
            .lock()
            .get(operation)
            .map(|i| i.remaining)
            .unwrap_or(0)
    }

    /// Active injections, sorted by operation
    pub fn injections(&self) -> BTreeMap<String, InjectedFailure> {
        self.injections.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.injections.lock().is_empty()
    }

    pub fn reset(&self) {
        self.injections.lock().clear();
    }
}
