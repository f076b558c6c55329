//! Navigation over the configuration tree
//!
//! The configuration tree is a [`serde_json::Value`] DOM (ordered maps,
//! sequences, scalars). These helpers locate and replace nodes by
//! [`Address`]; resolution never deletes or reorders unrelated nodes.

use serde_json::Value;

use crate::address::{Address, Segment};

/// Returns the node at `address`, or `None` if the path does not exist.
#[must_use]
pub fn value_at<'a>(root: &'a Value, address: &Address) -> Option<&'a Value> {
    let mut node = root;
    for segment in address.segments() {
        node = match segment {
            Segment::Key(key) => node.as_object()?.get(key)?,
            Segment::Index(index) => node.as_array()?.get(*index)?,
        };
    }
    Some(node)
}

/// Returns a mutable handle to the node at `address`.
#[must_use]
pub fn value_at_mut<'a>(root: &'a mut Value, address: &Address) -> Option<&'a mut Value> {
    let mut node = root;
    for segment in address.segments() {
        node = match segment {
            Segment::Key(key) => node.as_object_mut()?.get_mut(key)?,
            Segment::Index(index) => node.as_array_mut()?.get_mut(*index)?,
        };
    }
    Some(node)
}

/// Replaces the node at `address` with `value`.
///
/// Returns the previous node, or `None` (leaving the tree untouched) if the
/// address does not exist.
pub fn replace(root: &mut Value, address: &Address, value: Value) -> Option<Value> {
    let node = value_at_mut(root, address)?;
    Some(std::mem::replace(node, value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn sample_tree() -> Value {
        json!({
            "service": "billing",
            "provider": { "region": "eu-west-1" },
            "functions": [ { "name": "ingest" } ],
        })
    }

    #[test]
    fn test_value_at_object_path() {
        let tree = sample_tree();
        let address = Address::from_dotted("provider.region");
        assert_eq!(value_at(&tree, &address), Some(&json!("eu-west-1")));
    }

    #[test]
    fn test_value_at_sequence_path() {
        let tree = sample_tree();
        let address = Address::from_dotted("functions.0.name");
        assert_eq!(value_at(&tree, &address), Some(&json!("ingest")));
    }

    #[test]
    fn test_value_at_root() {
        let tree = sample_tree();
        assert_eq!(value_at(&tree, &Address::root()), Some(&tree));
    }

    #[test]
    fn test_value_at_missing_path() {
        let tree = sample_tree();
        assert_eq!(value_at(&tree, &Address::from_dotted("provider.stage")), None);
        assert_eq!(value_at(&tree, &Address::from_dotted("functions.3")), None);
        assert_eq!(value_at(&tree, &Address::from_dotted("service.deep")), None);
    }

    #[test]
    fn test_replace_leaf() {
        let mut tree = sample_tree();
        let address = Address::from_dotted("provider.region");

        let previous = replace(&mut tree, &address, json!("us-east-1"));

        assert_eq!(previous, Some(json!("eu-west-1")));
        assert_eq!(value_at(&tree, &address), Some(&json!("us-east-1")));
        // Unrelated nodes are untouched.
        assert_eq!(
            value_at(&tree, &Address::from_dotted("service")),
            Some(&json!("billing"))
        );
    }

    #[test]
    fn test_replace_missing_path_is_a_no_op() {
        let mut tree = sample_tree();
        let before = tree.clone();
        assert_eq!(replace(&mut tree, &Address::from_dotted("no.such"), json!(1)), None);
        assert_eq!(tree, before);
    }
}
