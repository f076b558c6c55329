//! Variable resolution engine
//!
//! Resolves every pending address in the variables index: dependencies are
//! resolved recursively through the property accessor, the matching source
//! is invoked, the result is normalized and written back into the tree, and
//! any expressions the result itself contains are re-indexed and resolved in
//! the same run.
//!
//! Failures never abort a pass; each is recorded against its owning address
//! so callers can enumerate every configuration error at once. Occurrences
//! naming a source the registry does not know stay pending, not errored, so
//! a later pass with an extended registry can pick them up.

use std::collections::HashSet;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use serde_json::{Map, Value};
use skylift_domain::{Address, ErrorCode, ResolutionError, Segment, tree};

use crate::meta::{self, MetaEntry, VariablesMeta};
use crate::parser::{Expression, Fallback, Fragment};
use crate::sources::{
    ConfigurationProperties, PropertyError, PropertyState, SourceContext, SourceRegistry,
    SourceValue,
};

/// Bound on how many times a source's own output may re-trigger resolution
/// at one address. Bounds sources that recursively reproduce their own
/// trigger expression, which would otherwise recurse forever.
pub const MAX_NEST_DEPTH: u32 = 10;

/// Input to one [`resolve`] call. The tree and the index are mutated in
/// place; the caller is responsible for serializing passes over one tree.
pub struct ResolveRequest<'a> {
    /// The service directory of the surrounding tool; passed through to
    /// sources untouched.
    pub service_path: &'a Path,
    /// The configuration tree; resolved values replace expression strings in
    /// place.
    pub configuration: &'a mut Value,
    /// The variables index produced by [`crate::meta::resolve_meta`].
    pub variables_meta: &'a mut VariablesMeta,
    /// The source registry for this pass.
    pub sources: &'a SourceRegistry,
    /// Caller options; passed through to sources untouched.
    pub options: &'a Map<String, Value>,
}

/// Runs one resolution pass to its fixpoint.
///
/// Returns once no further progress can be made: every remaining entry is
/// either errored or pending on an unrecognized or incomplete source.
/// Never fails — all failures are recorded per-address in the index.
pub async fn resolve(request: ResolveRequest<'_>) {
    let mut pass = Pass {
        tree: request.configuration,
        meta: request.variables_meta,
        sources: request.sources,
        service_path: request.service_path,
        options: request.options,
        stack: Vec::new(),
        deferred: HashSet::new(),
    };

    loop {
        let batch: Vec<Address> = pass
            .meta
            .pending_addresses()
            .into_iter()
            .filter(|address| !pass.deferred.contains(address))
            .collect();
        if batch.is_empty() {
            break;
        }
        for address in batch {
            pass.resolve_address(address).await;
        }
    }
}

/// Outcome of resolving an expression or a fragment list.
enum Outcome {
    /// A final value.
    Value(Value),
    /// Not resolvable this pass (unrecognized or incomplete source,
    /// or a dependency that is itself pending).
    Pending,
    /// A failure to record at the owning address.
    Failed(ResolutionError),
}

type EngineFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// State of one resolution pass. Processing is sequential within a pass;
/// `stack` carries the addresses currently being resolved for cycle
/// detection, `deferred` the addresses already settled as pending this pass.
struct Pass<'a> {
    tree: &'a mut Value,
    meta: &'a mut VariablesMeta,
    sources: &'a SourceRegistry,
    service_path: &'a Path,
    options: &'a Map<String, Value>,
    stack: Vec<Address>,
    deferred: HashSet<Address>,
}

impl Pass<'_> {
    /// Resolves every occurrence at one address and settles it: value
    /// written back and entry purged, failure recorded, or deferred to a
    /// later pass.
    fn resolve_address(&mut self, address: Address) -> EngineFuture<'_, ()> {
        Box::pin(async move {
            if self.deferred.contains(&address) || self.stack.contains(&address) {
                return;
            }
            let Some(MetaEntry::Pending(entry)) = self.meta.get(&address) else {
                return;
            };
            let entry = entry.clone();

            tracing::trace!(%address, "resolving configuration address");
            self.stack.push(address.clone());
            let outcome = self.resolve_fragments(&entry.fragments).await;
            self.stack.pop();

            match outcome {
                Outcome::Pending => {
                    tracing::debug!(%address, "address left pending for a later pass");
                    self.deferred.insert(address);
                }
                Outcome::Failed(error) => {
                    tracing::warn!(%address, code = error.code.as_str(), "variable resolution failed: {}", error.message);
                    self.meta.insert(address, MetaEntry::Failed(error));
                }
                Outcome::Value(value) => {
                    self.accept_result(address, value, entry.depth).await;
                }
            }
        })
    }

    /// Writes a resolved value into the tree, purges the entry, and queues
    /// (and resolves) any expressions the value itself contains.
    async fn accept_result(&mut self, address: Address, value: Value, depth: u32) {
        if tree::replace(self.tree, &address, value).is_none() {
            self.meta.insert(
                address.clone(),
                MetaEntry::Failed(ResolutionError::resolution(format!(
                    "configuration node at \"{address}\" disappeared during resolution"
                ))),
            );
            return;
        }
        self.meta.remove(&address);

        let Some(node) = tree::value_at(self.tree, &address) else {
            return;
        };
        let mut nested = VariablesMeta::new();
        meta::index_value(&mut nested, &address, node, depth + 1);

        for (nested_address, entry) in nested {
            if depth + 1 > MAX_NEST_DEPTH && matches!(entry, MetaEntry::Pending(_)) {
                self.meta.insert(
                    nested_address.clone(),
                    MetaEntry::Failed(ResolutionError::new(
                        ErrorCode::ExcessiveResolvedPropertiesNestDepth,
                        format!(
                            "nested variables at \"{nested_address}\" exceeded \
                             {MAX_NEST_DEPTH} levels of re-resolution"
                        ),
                    )),
                );
                continue;
            }
            let is_pending = matches!(entry, MetaEntry::Pending(_));
            self.meta.insert(nested_address.clone(), entry);
            if is_pending {
                // Resolve within this run so the owning subtree is final
                // before anything depends on it.
                self.resolve_address(nested_address).await;
            }
        }
    }

    /// Resolves a fragment list to a single value: the expression's own
    /// result for the whole-value form, a joined string otherwise.
    async fn resolve_fragments(&mut self, fragments: &[Fragment]) -> Outcome {
        if let [Fragment::Expression(expression)] = fragments {
            return self.resolve_expression(expression).await;
        }

        let mut joined = String::new();
        for fragment in fragments {
            match fragment {
                Fragment::Literal(text) => joined.push_str(text),
                Fragment::Expression(expression) => {
                    match self.resolve_expression(expression).await {
                        Outcome::Value(value) => match stringify_fragment(&value) {
                            Some(text) => joined.push_str(&text),
                            None => {
                                return Outcome::Failed(ResolutionError::new(
                                    ErrorCode::NonStringVariableResult,
                                    format!(
                                        "source \"{}\" returned a non-string value within \
                                         a string interpolation",
                                        expression.source
                                    ),
                                ));
                            }
                        },
                        other => return other,
                    }
                }
            }
        }
        Outcome::Value(Value::String(joined))
    }

    /// Resolves one expression: argument and parameter sub-expressions
    /// first, then the source call, then fallback and incompleteness rules.
    fn resolve_expression<'s>(&'s mut self, expression: &'s Expression) -> EngineFuture<'s, Outcome> {
        Box::pin(async move {
            let mut address_argument = None;
            if let Some(fragments) = &expression.argument {
                match self.resolve_fragments(fragments).await {
                    Outcome::Value(value) => match stringify_fragment(&value) {
                        Some(text) => address_argument = Some(text),
                        None => {
                            return Outcome::Failed(ResolutionError::new(
                                ErrorCode::NonStringVariableResult,
                                format!(
                                    "address argument of source \"{}\" resolved to a \
                                     non-string value",
                                    expression.source
                                ),
                            ));
                        }
                    },
                    other => return other,
                }
            }

            let mut params = None;
            if let Some(param_fragments) = &expression.params {
                let mut resolved = Vec::with_capacity(param_fragments.len());
                for fragments in param_fragments {
                    match self.resolve_fragments(fragments).await {
                        Outcome::Value(value) => resolved.push(value),
                        other => return other,
                    }
                }
                params = Some(resolved);
            }

            let Some(source) = self.sources.get(&expression.source).cloned() else {
                // Unknown source names are not an error: the address stays
                // pending so a later pass with an extended registry can
                // resolve it.
                tracing::debug!(source = %expression.source, "source not in registry, leaving occurrence pending");
                return Outcome::Pending;
            };

            let service_path = self.service_path;
            let options = self.options;
            let context = SourceContext {
                address: address_argument,
                params,
                service_path,
                options,
                properties: &mut *self,
            };
            let result = source.resolve(context).await;

            let value = match result {
                Err(error) => {
                    return Outcome::Failed(ResolutionError::resolution(format!(
                        "cannot resolve variable \"{}\": {error}",
                        expression.source
                    )));
                }
                Ok(SourceValue::Pending) => return Outcome::Pending,
                Ok(SourceValue::Final(value)) => value,
            };

            if source.is_incomplete() {
                // The present answer may change on a later pass; the value
                // is discarded and the address stays pending.
                return Outcome::Pending;
            }

            if value.is_null() {
                return match &expression.fallback {
                    Some(Fallback::Text(text)) => Outcome::Value(Value::String(text.clone())),
                    Some(Fallback::Null) => Outcome::Value(Value::Null),
                    None => Outcome::Failed(ResolutionError::new(
                        ErrorCode::MissingVariableResult,
                        format!(
                            "source \"{}\" returned no value and no fallback was provided",
                            expression.source
                        ),
                    )),
                };
            }
            Outcome::Value(value)
        })
    }
}

#[async_trait]
impl ConfigurationProperties for Pass<'_> {
    async fn resolve_property(&mut self, path: &[Segment]) -> Result<PropertyState, PropertyError> {
        if path.is_empty() {
            return Err(PropertyError::RootReference);
        }
        let target = Address::from_segments(path.iter().cloned());

        // Resolve every entry covering the requested path before reading it.
        for dependency in self.meta.pending_within(&target) {
            if self.stack.contains(&dependency) {
                return Err(PropertyError::CircularDependency(dependency));
            }
            self.resolve_address(dependency).await;
        }

        let mut pending = false;
        for (entry_address, entry) in self.meta.iter() {
            if entry_address.overlaps(&target) {
                match entry {
                    MetaEntry::Pending(_) => pending = true,
                    MetaEntry::Failed(error) => {
                        return Err(PropertyError::DependencyFailed(
                            entry_address.clone(),
                            error.message.clone(),
                        ));
                    }
                }
            }
        }
        if pending {
            return Ok(PropertyState::Pending);
        }

        match tree::value_at(self.tree, &target) {
            Some(value) => Ok(PropertyState::Resolved(value.clone())),
            None => Ok(PropertyState::Missing),
        }
    }
}

/// Embeds a resolved value into a string interpolation: strings pass
/// through, numbers and booleans are stringified, null becomes the empty
/// string, and structured values are rejected.
fn stringify_fragment(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Object(_) | Value::Array(_) => None,
    }
}
