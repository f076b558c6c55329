//! Source and property-accessor ports
//!
//! A [`Source`] is a pluggable resolver capability registered under a name in
//! a [`SourceRegistry`] supplied by the caller on every resolution pass. The
//! engine hands each source a [`SourceContext`] carrying its resolved
//! arguments and a [`ConfigurationProperties`] accessor for cross-references
//! into other configuration properties.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use skylift_domain::{Address, Segment};
use thiserror::Error;

/// Outcome of a source resolution attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceValue {
    /// The source produced a value. `Value::Null` counts as a missing
    /// result, triggering the expression's fallback (or
    /// `MISSING_VARIABLE_RESULT` without one).
    Final(Value),
    /// The source depends on something not resolvable yet; the owning
    /// address stays pending for a later pass.
    Pending,
}

/// Failure raised by a source. Every variant surfaces to the owning address
/// as `VARIABLE_RESOLUTION_ERROR` with a best-effort message.
#[derive(Debug, Error)]
pub enum SourceError {
    /// A failure described only by its message.
    #[error("{0}")]
    Message(String),

    /// A property dependency could not be used (cycle, prior failure, root
    /// reference).
    #[error(transparent)]
    Property(#[from] PropertyError),
}

impl SourceError {
    /// Creates a generic failure from a message.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

/// Failures of the property accessor, propagated one hop to the dependent
/// address.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PropertyError {
    /// The empty path: a property cannot reference the configuration root.
    #[error("cannot reference the root of the configuration")]
    RootReference,

    /// The requested property is currently being resolved further up the
    /// call stack.
    #[error("circular dependency on \"{0}\"")]
    CircularDependency(Address),

    /// The requested property already failed to resolve.
    #[error("dependency \"{0}\" could not be resolved: {1}")]
    DependencyFailed(Address, String),
}

/// State of a configuration property as seen through the accessor.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyState {
    /// The property exists and is fully resolved.
    Resolved(Value),
    /// The addressed node does not exist; callers supply their own fallback
    /// semantics.
    Missing,
    /// The property still has unresolved occurrences (unrecognized or
    /// incomplete source); callers propagate the pending state upward.
    Pending,
}

/// Accessor for other configuration properties, bound to the active
/// resolution pass. Requesting a property that is still pending triggers its
/// resolution first, following the same rules (and the same cycle tracking)
/// as the engine itself.
#[async_trait]
pub trait ConfigurationProperties: Send {
    /// Resolves the property at the given root-relative path.
    ///
    /// # Errors
    ///
    /// Returns a [`PropertyError`] for the empty path, a circular
    /// dependency, or a dependency whose own resolution already failed.
    async fn resolve_property(&mut self, path: &[Segment]) -> Result<PropertyState, PropertyError>;
}

/// Input to a source's [`Source::resolve`] call.
pub struct SourceContext<'a> {
    /// The resolved colon-form address argument, when present.
    pub address: Option<String>,
    /// The resolved call-form parameters, when present.
    pub params: Option<Vec<Value>>,
    /// The service directory of the surrounding tool; opaque passthrough.
    pub service_path: &'a Path,
    /// Caller options (CLI options of the surrounding tool); opaque
    /// passthrough.
    pub options: &'a Map<String, Value>,
    /// Accessor for other configuration properties.
    pub properties: &'a mut dyn ConfigurationProperties,
}

/// A pluggable resolver capability, addressed by name.
#[async_trait]
pub trait Source: Send + Sync {
    /// Resolves one occurrence.
    ///
    /// # Errors
    ///
    /// Any error is recorded as `VARIABLE_RESOLUTION_ERROR` at the owning
    /// address; it never aborts the pass.
    async fn resolve(&self, context: SourceContext<'_>) -> Result<SourceValue, SourceError>;

    /// Marks a source whose present answer may change on a later pass (an
    /// external system not ready yet). Successful calls still leave the
    /// owning address pending.
    fn is_incomplete(&self) -> bool {
        false
    }
}

/// Registry of sources by name. Unknown names are a distinguished "not
/// found" outcome, not an error: the engine leaves such occurrences pending
/// for a later pass with an extended registry.
#[derive(Default, Clone)]
pub struct SourceRegistry {
    sources: HashMap<String, Arc<dyn Source>>,
}

impl SourceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, source: impl Source + 'static) {
        self.sources.insert(name.into(), Arc::new(source));
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, source: impl Source + 'static) -> Self {
        self.register(name, source);
        self
    }

    /// Looks a source up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Source>> {
        self.sources.get(name)
    }

    /// Returns true if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    /// Returns the number of registered sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns true if no source is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("names", &self.sources.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    struct StaticSource(Value);

    #[async_trait]
    impl Source for StaticSource {
        async fn resolve(&self, _context: SourceContext<'_>) -> Result<SourceValue, SourceError> {
            Ok(SourceValue::Final(self.0.clone()))
        }
    }

    #[test]
    fn test_registry_lookup() {
        let registry = SourceRegistry::new().with("env", StaticSource(json!("eu-west-1")));

        assert!(registry.contains("env"));
        assert!(registry.get("env").is_some());
        assert!(registry.get("opt").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = SourceRegistry::new();
        registry.register("env", StaticSource(json!(1)));
        registry.register("env", StaticSource(json!(2)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_property_error_messages() {
        let error = PropertyError::CircularDependency(Address::from_dotted("custom.a"));
        assert_eq!(error.to_string(), "circular dependency on \"custom.a\"");
    }
}
