//! Skylift Domain - Core types for configuration variable resolution
//!
//! This crate defines the pure data model shared by the resolution engine:
//! addresses into the configuration tree, tree navigation helpers, and the
//! resolution error taxonomy. All types here are plain Rust with no I/O
//! dependencies.

pub mod address;
pub mod error;
pub mod tree;

pub use address::{Address, Segment};
pub use error::{ErrorCode, ResolutionError};
