//! SSG knowledge base: shared model
//!
//! This crate defines the entities produced by the four format parsers
//! (HTML guides, HTML tables, JSON manifests, SCAP data streams), the
//! cross-reference edge shape, the identifier patterns every crate agrees on,
//! and the polymorphic tree nodes used to browse guides and benchmarks.
//!
//! Nothing in here touches the filesystem or the database.

pub mod edges;
pub mod entities;
pub mod error;
pub mod ids;
pub mod tree;

pub use edges::*;
pub use entities::*;
pub use error::{SsgError, SsgResult};
pub use tree::{build_forest, FlatNode, GroupNode, RuleNode, TreeNode};
