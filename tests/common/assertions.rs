#![allow(dead_code)]

/// Assertion helpers for dispatch results and circuit state
use anyhow::Result;
use resilient_dispatch::error::{CircuitState, ResilientDispatcher};
use resilient_dispatch::{Dispatched, Value, ValueSource};

/// Assert a dispatch produced `expected` from the primary path
pub fn assert_primary(result: &Dispatched, expected: &Value) -> Result<()> {
    anyhow::ensure!(
        result.source == ValueSource::Primary,
        "Expected primary source, got {} (value {})",
        result.source,
        result.value
    );
    anyhow::ensure!(
        &result.value == expected,
        "Expected value {}, got {}",
        expected,
        result.value
    );
    Ok(())
}

/// Assert a dispatch degraded to the NaN numeric default
pub fn assert_nan_default(result: &Dispatched) -> Result<()> {
    anyhow::ensure!(
        result.source == ValueSource::Default,
        "Expected default source, got {}",
        result.source
    );
    anyhow::ensure!(
        result.value.is_nan_sentinel(),
        "Expected NaN sentinel, got {}",
        result.value
    );
    Ok(())
}

/// Assert a provider's circuit is in `expected` state
pub fn assert_circuit(
    dispatcher: &ResilientDispatcher,
    provider: &str,
    expected: CircuitState,
) -> Result<()> {
    let snapshot = dispatcher.circuit_state(provider);
    anyhow::ensure!(
        snapshot.state == expected,
        "Circuit '{}' is {} (failures: {}), expected {}",
        provider,
        snapshot.state,
        snapshot.consecutive_failures,
        expected
    );
    Ok(())
}
