//! Scoped temporary nodes for rollout simulation.
//!
//! A [`TemporaryNode`] exclusively borrows the graph for its lifetime and
//! removes its node when dropped, so a rollout step cannot leak a node into
//! the permanent graph even when it exits early or through `?`. Holders get
//! read-only access to the graph and cannot attach edges.

use plotweave_types::EventId;
use tracing::{trace, warn};

use crate::graph::EventGraph;

/// A node that exists only until the guard is dropped.
#[derive(Debug)]
pub struct TemporaryNode<'g> {
    graph: &'g mut EventGraph,
    id: EventId,
}

impl<'g> TemporaryNode<'g> {
    /// Create a parentless temporary node holding `text`.
    ///
    /// The node consumes an id like any other; ids are never reused.
    pub fn create(graph: &'g mut EventGraph, text: impl Into<String>) -> Self {
        let id = graph.create_node(text);
        trace!(id = %id, "temporary node created");
        Self { graph, id }
    }

    /// The temporary node's id.
    pub const fn id(&self) -> EventId {
        self.id
    }

    /// Read access to the graph while the node exists.
    pub fn graph(&self) -> &EventGraph {
        &*self.graph
    }

    /// Texts of the temporary node's chronological chain.
    ///
    /// The node has no parent, so this is its own text alone.
    pub fn chain_texts(&self) -> Vec<String> {
        self.graph.chain_texts(self.id).unwrap_or_default()
    }
}

impl Drop for TemporaryNode<'_> {
    fn drop(&mut self) {
        match self.graph.remove_node(self.id) {
            Ok(_) => trace!(id = %self.id, "temporary node removed"),
            Err(e) => warn!(id = %self.id, error = %e, "temporary node already gone"),
        }
    }
}
