//! # Folio DOM
//!
//! Typed in-memory document tree for the editing layer.
//!
//! ```text
//! markup text ──(markup::parse_fragment)──▶ DocTree arena ──(markup::to_markup)──▶ markup text
//! ```
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Ids are never
//! reused: a removed subtree is only detached, so an id held by a decorator or a
//! form keeps pointing at the same (possibly detached) node.

pub mod error;
pub mod markup;
pub mod tree;
pub mod visit;

pub use error::{DomError, DomResult, MarkupError};
pub use markup::{parse_fragment, to_markup};
pub use tree::{DocTree, EventKind, Listener, Node, NodeId, NodeKind};
pub use visit::{walk_children, walk_node, AttributeCollector, Visitor};
