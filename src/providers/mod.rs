/// Built-in demonstration providers
///
/// Three independent providers, each its own circuit-breaker domain:
/// `calculator`, `text` and `calendar`.
pub mod calculator;
pub mod calendar;
pub mod text;

pub use calculator::Calculator;
pub use calendar::Calendar;
pub use text::Text;

use crate::registry::{OperationRegistry, Provider};
use crate::OperationResult;

/// Short names accepted in place of canonical operation names
pub const BUILTIN_ALIASES: [(&str, &str); 10] = [
    ("rev", "reverse"),
    ("upper", "uppercase"),
    ("lower", "lowercase"),
    ("words", "count_words"),
    ("today", "current_date"),
    ("now", "current_time"),
    ("plus", "add"),
    ("minus", "subtract"),
    ("times", "multiply"),
    ("mod", "modulo"),
];

/// Every built-in provider
pub fn builtin() -> Vec<Box<dyn Provider>> {
    vec![Box::new(Calculator), Box::new(Text), Box::new(Calendar)]
}

/// Register all built-in providers and their aliases
pub fn register_builtin(registry: &mut OperationRegistry) -> OperationResult<()> {
    for provider in builtin() {
        registry.register_provider(provider.as_ref())?;
    }
    for (alias, canonical) in BUILTIN_ALIASES {
        registry.register_alias(alias, canonical)?;
    }

    tracing::debug!(
        operations = registry.len(),
        aliases = BUILTIN_ALIASES.len(),
        "Built-in providers registered"
    );
    Ok(())
}
