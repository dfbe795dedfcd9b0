/// Operation registry - name → (provider, capability) routing table
///
/// Operations are registered once at startup and are immutable afterwards.
/// Lookups rewrite aliases to canonical names first; a miss produces an
/// `UnknownOperation` error that carries every valid name plus a
/// "did you mean" suggestion scored by longest common prefix.
use crate::error::mechanisms::DefaultKind;
use crate::{OperationError, OperationResult, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Callable bound at registration time
pub type OperationFn = Arc<dyn Fn(&[Value]) -> OperationResult<Value> + Send + Sync>;

/// Minimum shared leading characters for a suggestion
const MIN_SUGGESTION_PREFIX: usize = 2;

/// Typos shorter than this never get a suggestion
const MIN_TYPO_LENGTH: usize = 2;

/// A named, registered callable
#[derive(Clone)]
pub struct Operation {
    name: String,
    provider_id: String,
    description: String,
    default_kind: DefaultKind,
    invoke: OperationFn,
}

impl Operation {
    pub fn new<F>(name: impl Into<String>, provider_id: impl Into<String>, invoke: F) -> Self
    where
        F: Fn(&[Value]) -> OperationResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            provider_id: provider_id.into(),
            description: String::new(),
            default_kind: DefaultKind::UnchangedInput,
            invoke: Arc::new(invoke),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Documented default used when primary and explicit fallback both fail
    pub fn with_default(mut self, default_kind: DefaultKind) -> Self {
        self.default_kind = default_kind;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn default_kind(&self) -> &DefaultKind {
        &self.default_kind
    }

    /// Shared handle to the bound callable
    pub fn invoker(&self) -> OperationFn {
        Arc::clone(&self.invoke)
    }

    pub fn invoke(&self, args: &[Value]) -> OperationResult<Value> {
        (self.invoke)(args)
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("provider_id", &self.provider_id)
            .field("default_kind", &self.default_kind)
            .finish()
    }
}

/// Owner of one or more operations; the unit of circuit-breaker isolation
pub trait Provider {
    /// Provider identifier (circuit breaker key)
    fn id(&self) -> &'static str;

    /// Operations this provider exposes
    fn operations(&self) -> Vec<Operation>;
}

#[derive(Debug, Default)]
pub struct OperationRegistry {
    operations: BTreeMap<String, Arc<Operation>>,
    aliases: BTreeMap<String, String>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operation. Write-once: re-registering a name is an error.
    pub fn register(&mut self, operation: Operation) -> OperationResult<()> {
        validate_name(&operation.name)?;
        validate_name(&operation.provider_id)?;

        if self.operations.contains_key(&operation.name) || self.aliases.contains_key(&operation.name)
        {
            return Err(OperationError::DuplicateOperation(operation.name));
        }

        tracing::debug!(
            operation = %operation.name,
            provider = %operation.provider_id,
            "Operation registered"
        );
        self.operations
            .insert(operation.name.clone(), Arc::new(operation));
        Ok(())
    }

    /// Register every operation a provider exposes
    pub fn register_provider(&mut self, provider: &dyn Provider) -> OperationResult<()> {
        for operation in provider.operations() {
            if operation.provider_id != provider.id() {
                return Err(OperationError::Validation(format!(
                    "operation '{}' claims provider '{}' but was supplied by '{}'",
                    operation.name,
                    operation.provider_id,
                    provider.id()
                )));
            }
            self.register(operation)?;
        }
        Ok(())
    }

    /// Register `alias` as another name for `canonical`
    pub fn register_alias(
        &mut self,
        alias: impl Into<String>,
        canonical: impl Into<String>,
    ) -> OperationResult<()> {
        let alias = alias.into();
        let canonical = canonical.into();
        validate_name(&alias)?;

        if self.operations.contains_key(&alias) {
            return Err(OperationError::Validation(format!(
                "alias '{}' would shadow a registered operation",
                alias
            )));
        }
        if self.aliases.contains_key(&alias) {
            return Err(OperationError::DuplicateOperation(alias));
        }
        if !self.operations.contains_key(&canonical) {
            return Err(self.unknown(&canonical));
        }

        self.aliases.insert(alias, canonical);
        Ok(())
    }

    /// Rewrite an alias to its canonical name; unknown names pass through
    pub fn canonical_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    /// Resolve a name or alias to its operation. Any miss, blank names
    /// included, is an `UnknownOperation` listing the valid names.
    pub fn resolve(&self, name: &str) -> OperationResult<Arc<Operation>> {
        let canonical = self.canonical_name(name);
        self.operations
            .get(canonical)
            .cloned()
            .ok_or_else(|| self.unknown(name))
    }

    /// Sorted canonical operation names
    pub fn list(&self) -> Vec<String> {
        self.operations.keys().cloned().collect()
    }

    pub fn list_aliases(&self) -> BTreeMap<String, String> {
        self.aliases.clone()
    }

    /// Canonical names grouped by provider, each group sorted
    pub fn list_by_provider(&self) -> BTreeMap<String, Vec<String>> {
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for operation in self.operations.values() {
            grouped
                .entry(operation.provider_id.clone())
                .or_default()
                .push(operation.name.clone());
        }
        grouped
    }

    /// Description of an operation (aliases accepted)
    pub fn describe(&self, name: &str) -> OperationResult<String> {
        self.resolve(name)
            .map(|operation| operation.description.clone())
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Best "did you mean" candidate by longest common prefix
    pub fn suggest(&self, typo: &str) -> Option<String> {
        if typo.chars().count() < MIN_TYPO_LENGTH {
            return None;
        }

        let typo_lower = typo.to_lowercase();
        let mut best_match = None;
        let mut best_score = 0;

        for name in self.operations.keys().chain(self.aliases.keys()) {
            let common = typo_lower
                .chars()
                .zip(name.chars())
                .take_while(|(a, b)| a == b)
                .count();

            if common >= MIN_SUGGESTION_PREFIX && common > best_score {
                best_score = common;
                best_match = Some(name.clone());
            }
        }

        best_match
    }

    fn unknown(&self, name: &str) -> OperationError {
        OperationError::UnknownOperation {
            name: name.to_string(),
            suggestion: self.suggest(name),
            available: self.list(),
        }
    }
}

fn validate_name(name: &str) -> OperationResult<()> {
    if name.trim().is_empty() {
        Err(OperationError::Validation(
            "operation and provider names cannot be empty".to_string(),
        ))
    } else {
        Ok(())
    }
}
