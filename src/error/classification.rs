/// Error classification for retry decisions
///
/// Every `OperationError` carries an explicit `ErrorKind` tag. The classifier
/// maps that tag to one of two classes: Transient errors are retried,
/// Permanent errors never consume retry budget. The default permanent set is
/// small (validation, unknown operation, auth failure); everything else is
/// Transient unless the error itself declares otherwise.
use crate::{ErrorKind, OperationError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorClass {
    /// May succeed on retry (timeouts, rate limits, flaky providers)
    Transient,

    /// Will not succeed on retry (bad input, unknown operation, auth failure)
    Permanent,
}

impl ErrorClass {
    pub fn description(&self) -> &'static str {
        match self {
            ErrorClass::Transient => "Temporary error that may resolve on retry",
            ErrorClass::Permanent => "Error that will not resolve on retry",
        }
    }

    pub fn allows_retry(&self) -> bool {
        matches!(self, ErrorClass::Transient)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::Transient => write!(f, "Transient"),
            ErrorClass::Permanent => write!(f, "Permanent"),
        }
    }
}

/// Tag-driven classifier
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    permanent_kinds: HashSet<ErrorKind>,
}

impl ErrorClassifier {
    /// Classifier with the default permanent set
    pub fn new() -> Self {
        let permanent_kinds = [
            ErrorKind::Validation,
            ErrorKind::UnknownOperation,
            ErrorKind::AuthFailure,
        ]
        .into_iter()
        .collect();

        Self { permanent_kinds }
    }

    /// Treat an additional kind as Permanent
    pub fn with_permanent_kind(mut self, kind: ErrorKind) -> Self {
        self.permanent_kinds.insert(kind);
        self
    }

    /// Stop treating a kind as Permanent (self-identifying errors stay Permanent)
    pub fn without_permanent_kind(mut self, kind: ErrorKind) -> Self {
        self.permanent_kinds.remove(&kind);
        self
    }

    pub fn classify(&self, error: &OperationError) -> ErrorClass {
        if error.is_self_permanent() || self.permanent_kinds.contains(&error.kind()) {
            ErrorClass::Permanent
        } else {
            ErrorClass::Transient
        }
    }

    pub fn should_retry(&self, error: &OperationError) -> bool {
        self.classify(error).allows_retry()
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use test_case::test_case;

    #[test_case(OperationError::Validation("bad".into()), ErrorClass::Permanent ; "validation")]
    #[test_case(OperationError::AuthFailure("denied".into()), ErrorClass::Permanent ; "auth")]
    #[test_case(
        OperationError::UnknownOperation { name: "x".into(), suggestion: None, available: vec![] },
        ErrorClass::Permanent ; "unknown operation"
    )]
    #[test_case(OperationError::Permanent("nope".into()), ErrorClass::Permanent ; "self identified")]
    #[test_case(OperationError::Transient("flaky".into()), ErrorClass::Transient ; "transient")]
    #[test_case(OperationError::Timeout(Duration::from_secs(1)), ErrorClass::Transient ; "timeout")]
    #[test_case(OperationError::rate_limited("429", Some(Duration::from_secs(2))), ErrorClass::Transient ; "rate limited")]
    #[test_case(
        OperationError::CircuitOpen { provider: "p".into(), remaining: Duration::ZERO },
        ErrorClass::Permanent ; "circuit open fails fast"
    )]
    fn test_default_classification(error: OperationError, expected: ErrorClass) {
        assert_eq!(ErrorClassifier::new().classify(&error), expected);
    }

    #[test]
    fn test_error_class_allows_retry() {
        assert!(ErrorClass::Transient.allows_retry());
        assert!(!ErrorClass::Permanent.allows_retry());
    }

    #[test]
    fn test_custom_permanent_kind() {
        let classifier = ErrorClassifier::new().with_permanent_kind(ErrorKind::Timeout);
        let error = OperationError::Timeout(Duration::from_millis(10));
        assert_eq!(classifier.classify(&error), ErrorClass::Permanent);
        assert!(!classifier.should_retry(&error));
    }

    #[test]
    fn test_removing_kind_does_not_override_self_identification() {
        let classifier = ErrorClassifier::new()
            .without_permanent_kind(ErrorKind::Validation)
            .without_permanent_kind(ErrorKind::Permanent);

        assert_eq!(
            classifier.classify(&OperationError::Validation("x".into())),
            ErrorClass::Transient
        );
        assert_eq!(
            classifier.classify(&OperationError::Permanent("x".into())),
            ErrorClass::Permanent
        );
    }
}
