/// Common test utilities shared by the integration tests
///
/// This module provides:
/// - Scripted providers with call counters
/// - Dispatcher builders on a manual clock
/// - Assertion helpers for dispatch results and circuit state

pub mod assertions;
pub mod test_helpers;
