/// Fallback chain: primary → explicit fallback → documented default
///
/// When the primary path fails (permanent error, exhausted retries or an open
/// circuit) the resolver first tries a fallback registered for the operation,
/// then the operation's documented default. Every [`DefaultKind`] resolves for
/// any arguments, so the chain always ends in a value tagged with the
/// [`ValueSource`] that produced it.
use crate::registry::{Operation, OperationFn};
use crate::{OperationError, OperationResult, Value};
use chrono::{NaiveDate, NaiveTime};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Documented default returned when every other path failed
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultKind {
    /// Echo the first argument (string transformations); empty text without one
    UnchangedInput,

    /// Echo the first argument (date arithmetic); 1970-01-01 without one
    UnchangedDate,

    /// NaN; never equal to a valid number
    SentinelNumeric,

    /// -1 for counts
    SentinelCount,

    /// 1970-01-01
    SentinelDate,

    /// 00:00:00
    SentinelTime,

    Fixed(Value),
}

impl DefaultKind {
    /// Default for a call with `args`. Every kind resolves for any arguments.
    pub fn default_value(&self, args: &[Value]) -> Value {
        match self {
            DefaultKind::UnchangedInput => args
                .first()
                .cloned()
                .unwrap_or_else(|| Value::Text(String::new())),
            DefaultKind::UnchangedDate => args.first().cloned().unwrap_or_else(epoch),
            DefaultKind::SentinelNumeric => Value::Number(f64::NAN),
            DefaultKind::SentinelCount => Value::Integer(-1),
            DefaultKind::SentinelDate => epoch(),
            DefaultKind::SentinelTime => {
                Value::Time(NaiveTime::from_hms_opt(0, 0, 0).unwrap_or_default())
            }
            DefaultKind::Fixed(value) => value.clone(),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DefaultKind::UnchangedInput => "input returned unchanged",
            DefaultKind::UnchangedDate => "input date returned unchanged",
            DefaultKind::SentinelNumeric => "NaN",
            DefaultKind::SentinelCount => "-1",
            DefaultKind::SentinelDate => "epoch date (1970-01-01)",
            DefaultKind::SentinelTime => "midnight (00:00:00)",
            DefaultKind::Fixed(_) => "fixed value",
        }
    }
}

fn epoch() -> Value {
    Value::Date(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSource {
    Primary,
    Fallback,
    Default,
}

impl fmt::Display for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSource::Primary => write!(f, "primary"),
            ValueSource::Fallback => write!(f, "fallback"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

/// Explicit fallbacks keyed by canonical operation name
#[derive(Default)]
pub struct FallbackResolver {
    fallbacks: RwLock<HashMap<String, OperationFn>>,
}

impl FallbackResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or replace) the fallback for a canonical operation name
    pub fn register<F>(&self, operation: impl Into<String>, fallback: F)
    where
        F: Fn(&[Value]) -> OperationResult<Value> + Send + Sync + 'static,
    {
        let operation = operation.into();
        let replaced = self
            .fallbacks
            .write()
            .insert(operation.clone(), Arc::new(fallback))
            .is_some();
        tracing::debug!(operation = %operation, replaced, "Fallback registered");
    }

    pub fn has_fallback(&self, operation: &str) -> bool {
        self.fallbacks.read().contains_key(operation)
    }

    pub fn remove(&self, operation: &str) -> bool {
        self.fallbacks.write().remove(operation).is_some()
    }

    /// Resolve a value after the primary path failed with `primary_error`
    pub fn resolve(
        &self,
        operation: &Operation,
        args: &[Value],
        primary_error: &OperationError,
    ) -> (Value, ValueSource) {
        // Clone the handle so the lock is not held while user code runs
        let fallback = self.fallbacks.read().get(operation.name()).cloned();

        if let Some(fallback) = fallback {
            match fallback(args) {
                Ok(value) => {
                    tracing::warn!(
                        operation = operation.name(),
                        source = %ValueSource::Fallback,
                        error = %primary_error,
                        "Primary failed, using fallback"
                    );
                    return (value, ValueSource::Fallback);
                }
                Err(fallback_error) => {
                    tracing::warn!(
                        operation = operation.name(),
                        error = %fallback_error,
                        "Fallback failed, trying documented default"
                    );
                }
            }
        }

        let default_kind = operation.default_kind();
        tracing::warn!(
            operation = operation.name(),
            source = %ValueSource::Default,
            default = default_kind.description(),
            error = %primary_error,
            "Primary failed, using documented default"
        );
        (default_kind.default_value(args), ValueSource::Default)
    }
}
