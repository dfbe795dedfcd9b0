/// Recovery mechanisms used by the dispatcher
///
/// Fallback resolution, batch-level graceful degradation and the failure
/// injection seam used by tests and the CLI.
pub mod degraded_mode;
pub mod failure_injection;
pub mod fallback;

// Re-export main types
pub use degraded_mode::{BatchCall, DegradationReport, GracefulDegradation};
pub use failure_injection::{FailureInjector, InjectedFailure};
pub use fallback::{DefaultKind, FallbackResolver, ValueSource};
