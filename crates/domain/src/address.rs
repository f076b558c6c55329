//! Addresses of nodes in the configuration tree
//!
//! An [`Address`] is an ordered sequence of path segments identifying one
//! node in the configuration tree. Addresses are stable identities for tree
//! positions and are used as keys in the variables index.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One step of a path into the configuration tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Segment {
    /// A key into an object node.
    Key(String),
    /// An index into a sequence node.
    Index(usize),
}

impl Segment {
    /// Creates a key segment.
    #[must_use]
    pub fn key(name: impl Into<String>) -> Self {
        Self::Key(name.into())
    }
}

impl From<&str> for Segment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for Segment {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

/// A root-relative path identifying one node in the configuration tree.
///
/// Displays dot-joined, the way properties are reported to users
/// (`provider.region`, `functions.0.name`).
///
/// # Example
///
/// ```
/// use skylift_domain::Address;
///
/// let address = Address::root().child("provider").child("region");
/// assert_eq!(address.to_string(), "provider.region");
/// assert!(Address::root().is_prefix_of(&address));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Address(Vec<Segment>);

impl Address {
    /// The address of the tree root (an empty path).
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Builds an address from a sequence of segments.
    #[must_use]
    pub fn from_segments(segments: impl IntoIterator<Item = Segment>) -> Self {
        Self(segments.into_iter().collect())
    }

    /// Parses a dotted property path (`provider.region`) into an address.
    ///
    /// Purely numeric segments become sequence indices.
    #[must_use]
    pub fn from_dotted(path: &str) -> Self {
        if path.is_empty() {
            return Self::root();
        }
        Self(
            path.split('.')
                .map(|part| match part.parse::<usize>() {
                    Ok(index) => Segment::Index(index),
                    Err(_) => Segment::Key(part.to_string()),
                })
                .collect(),
        )
    }

    /// Returns the segments of this address.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// Returns true for the root address.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the address has no segments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns this address extended by one segment.
    #[must_use]
    pub fn child(&self, segment: impl Into<Segment>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    /// Returns this address extended by another address's segments.
    #[must_use]
    pub fn join(&self, relative: &Self) -> Self {
        let mut segments = self.0.clone();
        segments.extend(relative.0.iter().cloned());
        Self(segments)
    }

    /// Returns true if `self` addresses the same node as `other` or an
    /// ancestor of it.
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        other.0.len() >= self.0.len() && other.0[..self.0.len()] == self.0[..]
    }

    /// Returns true if the two addresses lie on one root-to-leaf line,
    /// i.e. either is a prefix of the other.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.is_prefix_of(other) || other.is_prefix_of(self)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
            first = false;
        }
        Ok(())
    }
}

impl FromIterator<Segment> for Address {
    fn from_iter<I: IntoIterator<Item = Segment>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
