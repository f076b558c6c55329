//! Tree indexer and the variables index
//!
//! [`resolve_meta`] walks the whole configuration tree once and produces a
//! [`VariablesMeta`]: an insertion-ordered index from address to the parsed
//! occurrences still awaiting resolution. The engine works the index down to
//! empty, recording failures in place of entries it cannot resolve.

use indexmap::IndexMap;
use serde_json::Value;
use skylift_domain::{Address, ErrorCode, ResolutionError};

use crate::parser::{self, Fragment};

/// The state of one indexed address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaEntry {
    /// The address still holds unresolved occurrences.
    Pending(PendingEntry),
    /// Resolution of the address failed; the error stays for reporting.
    Failed(ResolutionError),
}

/// Parsed occurrences awaiting resolution at one address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    /// The parsed fragments of the string value at this address.
    pub fragments: Vec<Fragment>,
    /// How many times source output has re-triggered resolution here; 0 for
    /// original configuration content.
    pub depth: u32,
}

/// Index of every address in the tree that still needs resolving, in
/// first-seen order.
///
/// An address is removed exactly when its node holds a final, fully-resolved
/// value with no error; failed addresses keep their entry so callers can
/// enumerate and report every failure after a pass.
#[derive(Debug, Clone, Default)]
pub struct VariablesMeta {
    entries: IndexMap<Address, MetaEntry>,
}

impl VariablesMeta {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of indexed addresses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is pending or failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entry at `address`, if any.
    #[must_use]
    pub fn get(&self, address: &Address) -> Option<&MetaEntry> {
        self.entries.get(address)
    }

    /// Inserts or replaces the entry at `address`, preserving the original
    /// position of a replaced entry.
    pub fn insert(&mut self, address: Address, entry: MetaEntry) {
        self.entries.insert(address, entry);
    }

    /// Removes the entry at `address`, preserving the order of the rest.
    pub fn remove(&mut self, address: &Address) -> Option<MetaEntry> {
        self.entries.shift_remove(address)
    }

    /// Iterates over all entries in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &MetaEntry)> {
        self.entries.iter()
    }

    /// Snapshot of every pending address, in first-seen order.
    #[must_use]
    pub fn pending_addresses(&self) -> Vec<Address> {
        self.entries
            .iter()
            .filter(|(_, entry)| matches!(entry, MetaEntry::Pending(_)))
            .map(|(address, _)| address.clone())
            .collect()
    }

    /// Pending addresses lying on the root-to-leaf line through `target`
    /// (the node itself, an ancestor holding it, or anything below it).
    #[must_use]
    pub fn pending_within(&self, target: &Address) -> Vec<Address> {
        self.entries
            .iter()
            .filter(|(address, entry)| {
                matches!(entry, MetaEntry::Pending(_)) && address.overlaps(target)
            })
            .map(|(address, _)| address.clone())
            .collect()
    }

    /// Iterates over the recorded failures, in first-seen order.
    pub fn errors(&self) -> impl Iterator<Item = (&Address, &ResolutionError)> {
        self.entries.iter().filter_map(|(address, entry)| match entry {
            MetaEntry::Failed(error) => Some((address, error)),
            MetaEntry::Pending(_) => None,
        })
    }

    /// Aggregates every recorded failure into one report, or `None` when
    /// nothing failed.
    #[must_use]
    pub fn report_errors(&self) -> Option<String> {
        let lines: Vec<String> = self
            .errors()
            .map(|(address, error)| format!("  \"{address}\": {error}"))
            .collect();
        if lines.is_empty() {
            None
        } else {
            Some(format!("variables resolution errored:\n{}", lines.join("\n")))
        }
    }
}

impl IntoIterator for VariablesMeta {
    type Item = (Address, MetaEntry);
    type IntoIter = indexmap::map::IntoIter<Address, MetaEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Walks the full tree and builds the initial variables index.
///
/// Strings that parse to at least one expression get a pending entry;
/// strings with malformed expression syntax get a failed
/// `UNTERMINATED_VARIABLE` entry attributed to their address. The tree is
/// not mutated, and re-running over the same tree yields the same index.
#[must_use]
pub fn resolve_meta(tree: &Value) -> VariablesMeta {
    let mut meta = VariablesMeta::new();
    index_value(&mut meta, &Address::root(), tree, 0);
    meta
}

/// Indexes one subtree rooted at `base`, recording entries at the given
/// re-resolution depth. Used by the engine to queue nested expressions that
/// appear inside freshly resolved source output.
pub fn index_value(meta: &mut VariablesMeta, base: &Address, value: &Value, depth: u32) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                index_value(meta, &base.child(key.as_str()), child, depth);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                index_value(meta, &base.child(index), child, depth);
            }
        }
        Value::String(text) if parser::contains_expression(text) => match parser::parse(text) {
            Ok(fragments) => {
                if fragments
                    .iter()
                    .any(|fragment| matches!(fragment, Fragment::Expression(_)))
                {
                    meta.insert(base.clone(), MetaEntry::Pending(PendingEntry { fragments, depth }));
                }
            }
            Err(error) => {
                meta.insert(
                    base.clone(),
                    MetaEntry::Failed(ResolutionError::new(
                        ErrorCode::UnterminatedVariable,
                        error.to_string(),
                    )),
                );
            }
        },
        _ => {}
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_tree_without_expressions_yields_empty_index() {
        let tree = json!({
            "service": "billing",
            "provider": { "memory": 512, "flags": [true, null] },
        });
        assert!(resolve_meta(&tree).is_empty());
    }

    #[test]
    fn test_indexes_strings_with_expressions() {
        let tree = json!({
            "provider": { "region": "${env:REGION}" },
            "functions": [ { "handler": "app.${opt:stage}" } ],
            "plain": "no variables here",
        });

        let meta = resolve_meta(&tree);

        assert_eq!(meta.len(), 2);
        assert!(matches!(
            meta.get(&Address::from_dotted("provider.region")),
            Some(MetaEntry::Pending(_))
        ));
        assert!(matches!(
            meta.get(&Address::from_dotted("functions.0.handler")),
            Some(MetaEntry::Pending(_))
        ));
        assert!(meta.get(&Address::from_dotted("plain")).is_none());
    }

    #[test]
    fn test_first_seen_order() {
        let tree = json!({
            "a": "${env:A}",
            "b": { "c": "${env:C}" },
            "d": "${env:D}",
        });

        let meta = resolve_meta(&tree);
        let addresses: Vec<String> = meta.iter().map(|(address, _)| address.to_string()).collect();
        assert_eq!(addresses, vec!["a", "b.c", "d"]);
    }

    #[test]
    fn test_unterminated_expression_recorded_as_failure() {
        let tree = json!({ "broken": "${env:REGION" });

        let meta = resolve_meta(&tree);

        match meta.get(&Address::from_dotted("broken")) {
            Some(MetaEntry::Failed(error)) => {
                assert_eq!(error.code, ErrorCode::UnterminatedVariable);
            }
            other => panic!("expected a failed entry, got {other:?}"),
        }
    }

    #[test]
    fn test_idempotent_re_run() {
        let tree = json!({ "a": "${env:A}", "broken": "${x" });
        let first = resolve_meta(&tree);
        let second = resolve_meta(&tree);
        assert_eq!(
            first.iter().collect::<Vec<_>>(),
            second.iter().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_pending_within_matches_ancestors_and_descendants() {
        let tree = json!({
            "custom": { "table": "${env:TABLE}" },
            "other": "${env:OTHER}",
        });
        let meta = resolve_meta(&tree);

        let below = meta.pending_within(&Address::from_dotted("custom"));
        assert_eq!(below, vec![Address::from_dotted("custom.table")]);

        let above = meta.pending_within(&Address::from_dotted("custom.table.deep"));
        assert_eq!(above, vec![Address::from_dotted("custom.table")]);

        assert!(meta.pending_within(&Address::from_dotted("unrelated")).is_empty());
    }

    #[test]
    fn test_report_errors_lists_every_failure() {
        let tree = json!({ "a": "${x", "b": "${y" });
        let meta = resolve_meta(&tree);

        let report = meta.report_errors().unwrap();
        assert!(report.contains("\"a\": UNTERMINATED_VARIABLE"));
        assert!(report.contains("\"b\": UNTERMINATED_VARIABLE"));
    }

    #[test]
    fn test_report_errors_none_when_clean() {
        let meta = resolve_meta(&json!({ "a": "${env:A}" }));
        assert!(meta.report_errors().is_none());
    }
}
