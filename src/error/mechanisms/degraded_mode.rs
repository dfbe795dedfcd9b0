/// Graceful degradation for batches of operations
///
/// A batch runs every entry through the dispatcher independently. One entry
/// failing never aborts the others; the report keeps successes and failure
/// reasons side by side along with an exact success ratio.
use crate::error::dispatcher::Dispatched;
use crate::{OperationResult, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ValueSource;

/// One named call in a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchCall {
    pub operation: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl BatchCall {
    pub fn new(operation: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            operation: operation.into(),
            args,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DegradationReport {
    pub results: BTreeMap<String, Value>,
    pub errors: BTreeMap<String, String>,
    pub sources: BTreeMap<String, ValueSource>,
    /// successes / total; 0.0 for an empty batch
    pub success_rate: f64,
}

impl DegradationReport {
    pub fn total(&self) -> usize {
        self.results.len() + self.errors.len()
    }

    /// Labels answered by a fallback or documented default
    pub fn degraded(&self) -> Vec<&str> {
        self.sources
            .iter()
            .filter(|(_, source)| **source != ValueSource::Primary)
            .map(|(label, _)| label.as_str())
            .collect()
    }

    /// Every entry produced a value
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn summary(&self) -> String {
        if self.total() == 0 {
            return "Empty batch".to_string();
        }

        let mut summary = format!(
            "{}/{} succeeded ({:.1}%)\n",
            self.results.len(),
            self.total(),
            self.success_rate * 100.0
        );

        let degraded = self.degraded();
        if !degraded.is_empty() {
            summary.push_str(&format!("  degraded: {}\n", degraded.join(", ")));
        }
        for (label, reason) in &self.errors {
            summary.push_str(&format!("  failed {}: {}\n", label, reason));
        }

        summary
    }
}

pub struct GracefulDegradation;

impl GracefulDegradation {
    /// Run every entry in label order through `dispatch`
    pub fn execute_batch<F>(calls: &BTreeMap<String, BatchCall>, mut dispatch: F) -> DegradationReport
    where
        F: FnMut(&str, &[Value]) -> OperationResult<Dispatched>,
    {
        let mut report = DegradationReport::default();

        for (label, call) in calls {
            match dispatch(&call.operation, &call.args) {
                Ok(dispatched) => {
                    report.sources.insert(label.clone(), dispatched.source);
                    report.results.insert(label.clone(), dispatched.value);
                }
                Err(error) => {
                    tracing::warn!(
                        label = %label,
                        operation = %call.operation,
                        error = %error,
                        "Batch entry failed"
                    );
                    report.errors.insert(label.clone(), error.to_string());
                }
            }
        }

        let total = report.total();
        report.success_rate = if total == 0 {
            0.0
        } else {
            report.results.len() as f64 / total as f64
        };

        if !report.is_complete() {
            tracing::warn!(
                succeeded = report.results.len(),
                total,
                success_rate = report.success_rate,
                "Batch completed with failures"
            );
        }

        report
    }
}
