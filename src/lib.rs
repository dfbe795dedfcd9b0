// Allow complex types where needed for boxed operation closures
#![allow(clippy::type_complexity)]

//! Resilient operation dispatch.
//!
//! Routes named operations to independent capability providers and wraps
//! every invocation in a uniform fault-tolerance policy: error
//! classification, retry with backoff, per-provider circuit breaking,
//! fallback chaining and partial-failure aggregation.

pub mod error;
pub mod providers;
pub mod registry;
pub mod value;

// Re-export the dispatch facade for convenience
pub use error::dispatcher::{Dispatched, ResilientDispatcher};
pub use error::mechanisms::{
    BatchCall, DefaultKind, DegradationReport, FailureInjector, FallbackResolver, ValueSource,
};
pub use registry::{Operation, OperationFn, OperationRegistry, Provider};
pub use value::Value;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Explicit classification tag carried by every [`OperationError`].
///
/// The classifier decides Transient/Permanent from this tag alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    UnknownOperation,
    DuplicateOperation,
    AuthFailure,
    Permanent,
    Transient,
    Timeout,
    RateLimited,
    CircuitOpen,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::UnknownOperation => "unknown_operation",
            ErrorKind::DuplicateOperation => "duplicate_operation",
            ErrorKind::AuthFailure => "auth_failure",
            ErrorKind::Permanent => "permanent",
            ErrorKind::Transient => "transient",
            ErrorKind::Timeout => "timeout",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::CircuitOpen => "circuit_open",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperationError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{}", unknown_operation_message(.name, .suggestion, .available))]
    UnknownOperation {
        name: String,
        suggestion: Option<String>,
        available: Vec<String>,
    },

    #[error("Operation already registered: '{0}'")]
    DuplicateOperation(String),

    #[error("Authentication failed: {0}")]
    AuthFailure(String),

    #[error("Permanent failure: {0}")]
    Permanent(String),

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Operation timed out after {}", format_duration(.0))]
    Timeout(Duration),

    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("Circuit '{provider}' is OPEN, retry after {}", format_duration(.remaining))]
    CircuitOpen { provider: String, remaining: Duration },
}

fn format_duration(duration: &Duration) -> String {
    humantime::format_duration(*duration).to_string()
}

fn unknown_operation_message(
    name: &str,
    suggestion: &Option<String>,
    available: &[String],
) -> String {
    let mut msg = format!("Unknown operation: '{}'.", name);
    if let Some(suggestion) = suggestion {
        msg.push_str(&format!(" Did you mean '{}'?", suggestion));
    }
    msg.push_str(&format!(" Available: {}", available.join(", ")));
    msg
}

impl OperationError {
    /// Classification tag for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            OperationError::Validation(_) => ErrorKind::Validation,
            OperationError::UnknownOperation { .. } => ErrorKind::UnknownOperation,
            OperationError::DuplicateOperation(_) => ErrorKind::DuplicateOperation,
            OperationError::AuthFailure(_) => ErrorKind::AuthFailure,
            OperationError::Permanent(_) => ErrorKind::Permanent,
            OperationError::Transient(_) => ErrorKind::Transient,
            OperationError::Timeout(_) => ErrorKind::Timeout,
            OperationError::RateLimited { .. } => ErrorKind::RateLimited,
            OperationError::CircuitOpen { .. } => ErrorKind::CircuitOpen,
        }
    }

    /// Whether the error declares itself non-retryable regardless of classifier policy
    pub fn is_self_permanent(&self) -> bool {
        matches!(
            self,
            OperationError::Permanent(_) | OperationError::CircuitOpen { .. }
        )
    }

    /// Server-suggested delay carried by rate-limit errors
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            OperationError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn rate_limited(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        OperationError::RateLimited {
            message: message.into(),
            retry_after,
        }
    }
}

pub type OperationResult<T> = Result<T, OperationError>;

/// Retry settings as they appear in configuration files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 10,
            max_delay_ms: 1000,
            jitter: true,
        }
    }
}

/// Circuit breaker settings as they appear in configuration files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitSettings {
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
}

impl Default for CircuitSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub retry: RetrySettings,
    pub circuit: CircuitSettings,
    /// Per-attempt deadline; `None` disables the timeout wrapper
    pub operation_timeout_ms: Option<u64>,
    pub operation_log_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            retry: RetrySettings::default(),
            circuit: CircuitSettings::default(),
            operation_timeout_ms: None,
            operation_log_capacity: 100,
        }
    }
}

impl DispatchConfig {
    /// Environment variable prefix, e.g. `DISPATCH__RETRY__MAX_RETRIES=5`
    pub const ENV_PREFIX: &'static str = "DISPATCH";

    /// Load configuration: defaults, then a TOML file, then `DISPATCH__*` env vars.
    ///
    /// With no explicit path the per-user config file is used if it exists.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let defaults = config::Config::try_from(&DispatchConfig::default())
            .context("Failed to seed configuration defaults")?;

        let mut builder = config::Config::builder().add_source(defaults);

        match path {
            Some(path) => {
                builder = builder.add_source(config::File::from(path.to_path_buf()).required(true));
            }
            None => {
                if let Some(default_path) = Self::default_path() {
                    builder = builder.add_source(config::File::from(default_path).required(false));
                }
            }
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(Self::ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: DispatchConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Per-user configuration file location
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "resilient-dispatch")
            .map(|dirs| dirs.config_dir().join("dispatch.toml"))
    }

    /// Semantic checks; reports every problem, not just the first
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut problems = Vec::new();

        if self.retry.base_delay_ms == 0 {
            problems.push("retry.base_delay_ms must be > 0".to_string());
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            problems.push(format!(
                "retry.max_delay_ms ({}) must be >= retry.base_delay_ms ({})",
                self.retry.max_delay_ms, self.retry.base_delay_ms
            ));
        }
        if self.circuit.failure_threshold == 0 {
            problems.push("circuit.failure_threshold must be > 0".to_string());
        }
        if self.operation_timeout_ms == Some(0) {
            problems.push("operation_timeout_ms must be > 0 when set".to_string());
        }
        if self.operation_log_capacity == 0 {
            problems.push("operation_log_capacity must be > 0".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("Invalid configuration: {}", problems.join("; "))
        }
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod lib_tests;
