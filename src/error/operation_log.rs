/// Bounded history of dispatched operations
use super::mechanisms::ValueSource;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;

/// Maximum rendered length of the argument list in a log entry
pub const MAX_ARGS_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationLogEntry {
    pub operation: String,
    pub provider: Option<String>,
    pub args: String,
    /// Where the value came from; `None` when the dispatch failed outright
    pub source: Option<ValueSource>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Ring buffer keeping the most recent `capacity` entries
#[derive(Debug)]
pub struct OperationLog {
    capacity: usize,
    entries: Mutex<VecDeque<OperationLogEntry>>,
}

impl OperationLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn record(&self, entry: OperationLogEntry) {
        let mut entries = self.entries.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Oldest first
    pub fn entries(&self) -> Vec<OperationLogEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(operation: &str) -> OperationLogEntry {
        OperationLogEntry {
            operation: operation.to_string(),
            provider: Some("text".to_string()),
            args: "[]".to_string(),
            source: Some(ValueSource::Primary),
            error: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_log_evicts_oldest() {
        let log = OperationLog::new(3);
        for name in ["a", "b", "c", "d"] {
            log.record(entry(name));
        }

        let names: Vec<_> = log.entries().into_iter().map(|e| e.operation).collect();
        assert_eq!(names, vec!["b", "c", "d"]);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_clear() {
        let log = OperationLog::new(10);
        log.record(entry("a"));
        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_entry_serializes_source_lowercase() {
        let json = serde_json::to_value(entry("reverse")).unwrap();
        assert_eq!(json["source"], "primary");
        assert_eq!(json["operation"], "reverse");
    }
}
