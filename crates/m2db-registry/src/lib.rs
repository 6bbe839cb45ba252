//! Path-addressed attribute registry for m2db.
//!
//! The registry gives a flat partitioned store filesystem-like addressing.
//! Every node lives in its own partition keyed by a normalized path; the
//! hierarchy is never held in memory but re-derived from path arithmetic
//! and an explicit child index that turns enumeration into a single
//! partition lookup.
//!
//! # Sections
//!
//! - [`path`]: [`NodePath`] normalization and node name rules
//! - [`node`]: [`RegistryNode`]: lifecycle, properties, children, copy/move
//! - [`tree`]: nested string-keyed import/export and JSON
//! - [`registry`]: [`Registry`]: node factory, provisioning, cleanup sweep
//! - [`schema`]: table layouts and versioned definitions

pub mod error;
pub mod node;
pub mod path;
pub mod registry;
pub mod schema;
pub mod tree;

pub use error::{RegistryError, RegistryResult};
pub use node::{NodeStatus, RegistryNode, HIDDEN_PREFIX};
pub use path::NodePath;
pub use registry::Registry;
pub use tree::{Tree, TreeValue};
