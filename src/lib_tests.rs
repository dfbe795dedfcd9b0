// Tests for lib.rs core types
//
// Tests cover: error kinds and messages, self-identification, configuration
// defaults, validation and layered loading (file + environment).

use super::*;
use serial_test::serial;
use std::io::Write;

// ==================== ERROR KIND TESTS ====================

#[test]
fn test_error_kind_mapping() {
    let cases = vec![
        (OperationError::Validation("x".into()), ErrorKind::Validation),
        (
            OperationError::DuplicateOperation("x".into()),
            ErrorKind::DuplicateOperation,
        ),
        (OperationError::AuthFailure("x".into()), ErrorKind::AuthFailure),
        (OperationError::Permanent("x".into()), ErrorKind::Permanent),
        (OperationError::Transient("x".into()), ErrorKind::Transient),
        (
            OperationError::Timeout(Duration::from_secs(1)),
            ErrorKind::Timeout,
        ),
        (
            OperationError::rate_limited("slow down", None),
            ErrorKind::RateLimited,
        ),
        (
            OperationError::CircuitOpen {
                provider: "p".into(),
                remaining: Duration::ZERO,
            },
            ErrorKind::CircuitOpen,
        ),
    ];

    for (error, kind) in cases {
        assert_eq!(error.kind(), kind, "wrong kind for {error:?}");
    }
}

#[test]
fn test_error_kind_display_matches_serde() {
    for kind in [
        ErrorKind::Validation,
        ErrorKind::UnknownOperation,
        ErrorKind::CircuitOpen,
        ErrorKind::RateLimited,
    ] {
        let json = serde_json::to_string(&kind).unwrap();
        assert_eq!(json, format!("\"{}\"", kind));
    }
}

#[test]
fn test_self_permanent_errors() {
    assert!(OperationError::Permanent("x".into()).is_self_permanent());
    assert!(OperationError::CircuitOpen {
        provider: "p".into(),
        remaining: Duration::ZERO
    }
    .is_self_permanent());
    assert!(!OperationError::Transient("x".into()).is_self_permanent());
    // Validation is permanent by classifier policy, not by self-identification
    assert!(!OperationError::Validation("x".into()).is_self_permanent());
}

#[test]
fn test_retry_after_only_on_rate_limit() {
    let err = OperationError::rate_limited("429", Some(Duration::from_millis(250)));
    assert_eq!(err.retry_after(), Some(Duration::from_millis(250)));
    assert_eq!(OperationError::Transient("x".into()).retry_after(), None);
}

// ==================== ERROR MESSAGE TESTS ====================

#[test]
fn test_unknown_operation_message_with_suggestion() {
    let err = OperationError::UnknownOperation {
        name: "revers".into(),
        suggestion: Some("reverse".into()),
        available: vec!["add".into(), "reverse".into()],
    };
    assert_eq!(
        err.to_string(),
        "Unknown operation: 'revers'. Did you mean 'reverse'? Available: add, reverse"
    );
}

#[test]
fn test_unknown_operation_message_without_suggestion() {
    let err = OperationError::UnknownOperation {
        name: "zzz".into(),
        suggestion: None,
        available: vec!["add".into()],
    };
    assert_eq!(err.to_string(), "Unknown operation: 'zzz'. Available: add");
}

#[test]
fn test_timeout_and_circuit_messages() {
    assert_eq!(
        OperationError::Timeout(Duration::from_millis(1500)).to_string(),
        "Operation timed out after 1s 500ms"
    );

    let err = OperationError::CircuitOpen {
        provider: "calculator".into(),
        remaining: Duration::from_secs(12),
    };
    assert_eq!(
        err.to_string(),
        "Circuit 'calculator' is OPEN, retry after 12s"
    );
}

#[test]
fn test_rate_limited_message() {
    let err = OperationError::rate_limited("quota spent", Some(Duration::from_secs(2)));
    assert_eq!(err.to_string(), "Rate limited: quota spent");
}

#[test]
fn test_operation_error_converts_to_anyhow() {
    let err: anyhow::Error = OperationError::Validation("bad".into()).into();
    assert!(err.to_string().contains("Validation failed: bad"));
    assert!(err.downcast_ref::<OperationError>().is_some());
}

// ==================== CONFIG DEFAULT TESTS ====================

#[test]
fn test_dispatch_config_default() {
    let config = DispatchConfig::default();

    assert_eq!(config.retry.max_retries, 3);
    assert_eq!(config.retry.base_delay_ms, 10);
    assert_eq!(config.retry.max_delay_ms, 1000);
    assert!(config.retry.jitter);
    assert_eq!(config.circuit.failure_threshold, 5);
    assert_eq!(config.circuit.reset_timeout_ms, 30_000);
    assert_eq!(config.operation_timeout_ms, None);
    assert_eq!(config.operation_log_capacity, 100);
    assert!(config.validate().is_ok());
}

#[test]
fn test_operation_timeout_conversion() {
    let mut config = DispatchConfig::default();
    assert_eq!(config.operation_timeout(), None);
    config.operation_timeout_ms = Some(250);
    assert_eq!(config.operation_timeout(), Some(Duration::from_millis(250)));
}

#[test]
fn test_validate_reports_every_problem() {
    let mut config = DispatchConfig::default();
    config.retry.base_delay_ms = 0;
    config.circuit.failure_threshold = 0;
    config.operation_log_capacity = 0;

    let msg = config.validate().unwrap_err().to_string();
    assert!(msg.starts_with("Invalid configuration"));
    assert!(msg.contains("retry.base_delay_ms must be > 0"));
    assert!(msg.contains("circuit.failure_threshold must be > 0"));
    assert!(msg.contains("operation_log_capacity must be > 0"));
}

#[test]
fn test_validate_delay_ordering_and_timeout() {
    let mut config = DispatchConfig::default();
    config.retry.base_delay_ms = 500;
    config.retry.max_delay_ms = 100;
    config.operation_timeout_ms = Some(0);

    let msg = config.validate().unwrap_err().to_string();
    assert!(msg.contains("retry.max_delay_ms (100) must be >= retry.base_delay_ms (500)"));
    assert!(msg.contains("operation_timeout_ms must be > 0"));
}

#[test]
fn test_partial_settings_deserialize_with_defaults() {
    let config: DispatchConfig =
        serde_json::from_str(r#"{"retry": {"max_retries": 9}}"#).unwrap();
    assert_eq!(config.retry.max_retries, 9);
    assert_eq!(config.retry.base_delay_ms, 10);
    assert_eq!(config.circuit, CircuitSettings::default());
}

// ==================== CONFIG LOADING TESTS ====================

fn write_config(dir: &tempfile::TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("dispatch.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

#[test]
#[serial]
fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
operation_timeout_ms = 2000

[retry]
max_retries = 5
jitter = false

[circuit]
failure_threshold = 2
"#,
    );

    let config = DispatchConfig::load(Some(&path)).unwrap();
    assert_eq!(config.retry.max_retries, 5);
    assert!(!config.retry.jitter);
    // Unspecified keys keep their defaults
    assert_eq!(config.retry.base_delay_ms, 10);
    assert_eq!(config.circuit.failure_threshold, 2);
    assert_eq!(config.circuit.reset_timeout_ms, 30_000);
    assert_eq!(config.operation_timeout(), Some(Duration::from_secs(2)));
}

#[test]
#[serial]
fn test_load_missing_explicit_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    assert!(DispatchConfig::load(Some(&path)).is_err());
}

#[test]
#[serial]
fn test_load_rejects_invalid_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[circuit]\nfailure_threshold = 0\n");

    let err = DispatchConfig::load(Some(&path)).unwrap_err();
    assert!(format!("{err:#}").contains("circuit.failure_threshold must be > 0"));
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[retry]\nmax_retries = 5\n");

    std::env::set_var("DISPATCH__RETRY__MAX_RETRIES", "8");
    let result = DispatchConfig::load(Some(&path));
    std::env::remove_var("DISPATCH__RETRY__MAX_RETRIES");

    assert_eq!(result.unwrap().retry.max_retries, 8);
}

#[test]
fn test_default_path_file_name() {
    if let Some(path) = DispatchConfig::default_path() {
        assert!(path.ends_with("dispatch.toml"));
    }
}
