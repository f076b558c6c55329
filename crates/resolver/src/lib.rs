//! Skylift Resolver - Configuration variable resolution
//!
//! This crate turns a configuration tree containing embedded reference
//! expressions (`${source(...)}`) into a fully-resolved tree of plain
//! values, querying pluggable, possibly asynchronous sources.
//!
//! It is built from four components:
//! - [`parser`] — parses a string into literal fragments and expressions;
//! - [`meta`] — indexes every string in the tree that still needs resolving;
//! - [`sources`] — the source and property-accessor ports;
//! - [`engine`] — the resolution engine: dependency walk, cycle and depth
//!   guards, result normalization, in-place write-back.
//!
//! # Usage
//!
//! ```
//! use std::path::Path;
//!
//! use serde_json::{json, Map};
//! use skylift_resolver::{resolve, resolve_meta, ResolveRequest, SourceRegistry};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut configuration = json!({ "service": "billing" });
//! let mut variables_meta = resolve_meta(&configuration);
//! assert!(variables_meta.is_empty());
//!
//! let sources = SourceRegistry::new();
//! let options = Map::new();
//! resolve(ResolveRequest {
//!     service_path: Path::new("."),
//!     configuration: &mut configuration,
//!     variables_meta: &mut variables_meta,
//!     sources: &sources,
//!     options: &options,
//! })
//! .await;
//! # }
//! ```

pub mod engine;
pub mod meta;
pub mod parser;
pub mod sources;

pub use engine::{MAX_NEST_DEPTH, ResolveRequest, resolve};
pub use meta::{MetaEntry, PendingEntry, VariablesMeta, resolve_meta};
pub use parser::{Expression, Fallback, Fragment, ParseError, contains_expression, parse};
pub use sources::{
    ConfigurationProperties, PropertyError, PropertyState, Source, SourceContext, SourceError,
    SourceRegistry, SourceValue,
};
