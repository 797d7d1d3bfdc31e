//! Event graph storage and traversal for the Plotweave story search.
//!
//! Every candidate continuation the search proposes becomes an
//! [`EventNode`] in an [`EventGraph`]. The graph owns its nodes outright;
//! independent searches use independent graphs and share nothing.
//!
//! # Modules
//!
//! - [`graph`] -- The [`EventGraph`] arena: creation, edges, removal, chain
//!   traversal, leaf and path enumeration.
//! - [`node`] -- [`EventNode`] records and [`Edge`]s.
//! - [`temporary`] -- [`TemporaryNode`], a drop guard for rollout nodes.
//! - [`render`] -- Bullet text, arrow text and Graphviz output.
//!
//! # Usage
//!
//! ```
//! use plotweave_graph::EventGraph;
//!
//! let mut graph = EventGraph::new();
//! let root = graph.create_node("A hero enters the forest");
//! let next = graph.append_child(root, "A wolf howls in the distance").ok();
//!
//! assert_eq!(graph.len(), 2);
//! assert_eq!(graph.all_root_to_leaf_paths(root).ok().map(|p| p.len()), Some(1));
//! assert!(next.is_some());
//! ```

pub mod graph;
pub mod node;
pub mod render;
pub mod temporary;

// Re-export primary types at crate root.
pub use graph::{EventGraph, LEADS_TO};
pub use node::{Edge, EventNode};
pub use render::bullet_list;
pub use temporary::TemporaryNode;

use plotweave_types::EventId;

/// Errors raised by graph operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// An operation referenced a node id the graph does not hold.
    #[error("unknown event node {id}")]
    UnknownNode {
        /// The missing id.
        id: EventId,
    },
}
