//! The event graph: an owned arena of [`EventNode`] records.
//!
//! Nodes live in an ordered map keyed by [`EventId`]. Outgoing and incoming
//! edges are kept in two separate adjacency maps, each list in insertion
//! order. The search only ever appends children, so in practice the graph
//! is a tree, but nothing here forbids a node from gaining a second parent.
//!
//! # Ordering
//!
//! Every query that returns several ids returns them in a fixed order:
//!
//! - children and parents in edge insertion order
//! - leaves in ascending id order
//! - root-to-leaf paths by ascending leaf id, depth-first within a leaf
//!
//! Traversals that walk upward follow the *first* parent (the earliest
//! incoming edge) and stop if a node repeats.

use std::collections::{BTreeMap, BTreeSet};

use plotweave_types::EventId;

use crate::GraphError;
use crate::node::{Edge, EventNode};

/// Label of the edge the search adds between a node and a generated child.
pub const LEADS_TO: &str = "leads to";

/// An owned, single-search event graph.
#[derive(Debug, Clone)]
pub struct EventGraph {
    nodes: BTreeMap<EventId, EventNode>,
    children: BTreeMap<EventId, Vec<Edge>>,
    parents: BTreeMap<EventId, Vec<EventId>>,
    next_id: EventId,
}

impl Default for EventGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl EventGraph {
    /// Create an empty graph whose first node will get id 1.
    pub const fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            children: BTreeMap::new(),
            parents: BTreeMap::new(),
            next_id: EventId::FIRST,
        }
    }

    /// Number of nodes currently stored.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `id` names a stored node.
    pub fn contains(&self, id: EventId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// The id the next created node will receive.
    pub const fn next_id(&self) -> EventId {
        self.next_id
    }

    /// All nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = &EventNode> {
        self.nodes.values()
    }

    /// Look up a node.
    pub fn node(&self, id: EventId) -> Result<&EventNode, GraphError> {
        self.nodes.get(&id).ok_or(GraphError::UnknownNode { id })
    }

    /// Create a node with empty guess histories and return its id.
    pub fn create_node(&mut self, text: impl Into<String>) -> EventId {
        self.create_node_with_guesses(text, Vec::new(), Vec::new())
    }

    /// Create a node with pre-populated guess histories and return its id.
    pub fn create_node_with_guesses(
        &mut self,
        text: impl Into<String>,
        forward_guesses: Vec<String>,
        backward_guesses: Vec<String>,
    ) -> EventId {
        let id = self.next_id;
        self.next_id = id.next();
        self.nodes.insert(
            id,
            EventNode::new(id, text.into(), forward_guesses, backward_guesses),
        );
        id
    }

    /// Create a node as a new child of `parent`, joined by a [`LEADS_TO`] edge.
    ///
    /// Fails without allocating an id if `parent` is unknown.
    pub fn append_child(
        &mut self,
        parent: EventId,
        text: impl Into<String>,
    ) -> Result<EventId, GraphError> {
        self.require(parent)?;
        let child = self.create_node(text);
        self.add_edge(parent, child, LEADS_TO)?;
        Ok(child)
    }

    /// Add a directed edge `parent -> child`.
    ///
    /// Adding an edge that already exists replaces its label and keeps its
    /// position; no parallel edge is created.
    pub fn add_edge(
        &mut self,
        parent: EventId,
        child: EventId,
        label: impl Into<String>,
    ) -> Result<(), GraphError> {
        self.require(parent)?;
        self.require(child)?;
        let label = label.into();

        let outgoing = self.children.entry(parent).or_default();
        if let Some(existing) = outgoing.iter_mut().find(|e| e.target == child) {
            existing.label = label;
            return Ok(());
        }
        outgoing.push(Edge {
            target: child,
            label,
        });
        self.parents.entry(child).or_default().push(parent);
        Ok(())
    }

    /// Delete a node and every edge touching it, returning the node.
    pub fn remove_node(&mut self, id: EventId) -> Result<EventNode, GraphError> {
        let node = self
            .nodes
            .remove(&id)
            .ok_or(GraphError::UnknownNode { id })?;

        for edge in self.children.remove(&id).unwrap_or_default() {
            if let Some(incoming) = self.parents.get_mut(&edge.target) {
                incoming.retain(|p| *p != id);
            }
        }
        for parent in self.parents.remove(&id).unwrap_or_default() {
            if let Some(outgoing) = self.children.get_mut(&parent) {
                outgoing.retain(|e| e.target != id);
            }
        }
        Ok(node)
    }

    /// Outgoing edges of `id` in insertion order.
    pub fn edges_from(&self, id: EventId) -> Result<&[Edge], GraphError> {
        self.require(id)?;
        Ok(self.outgoing(id))
    }

    /// Children of `id` in insertion order.
    pub fn children_of(&self, id: EventId) -> Result<Vec<EventId>, GraphError> {
        Ok(self.edges_from(id)?.iter().map(|e| e.target).collect())
    }

    /// Number of children of `id`.
    pub fn child_count(&self, id: EventId) -> Result<usize, GraphError> {
        Ok(self.edges_from(id)?.len())
    }

    /// Parents of `id` in insertion order. At most one in normal use.
    pub fn parents_of(&self, id: EventId) -> Result<Vec<EventId>, GraphError> {
        self.require(id)?;
        Ok(self.parents.get(&id).cloned().unwrap_or_default())
    }

    /// The earliest-added parent of `id`, if any.
    pub fn first_parent(&self, id: EventId) -> Result<Option<EventId>, GraphError> {
        self.require(id)?;
        Ok(self.first_parent_of(id))
    }

    /// Append a generated continuation to the node's forward guess history.
    pub fn push_forward_guess(
        &mut self,
        id: EventId,
        text: impl Into<String>,
    ) -> Result<(), GraphError> {
        self.nodes
            .get_mut(&id)
            .ok_or(GraphError::UnknownNode { id })?
            .push_forward_guess(text.into());
        Ok(())
    }

    /// Remove and return the most recent forward guess of the node.
    pub fn pop_forward_guess(&mut self, id: EventId) -> Result<Option<String>, GraphError> {
        Ok(self
            .nodes
            .get_mut(&id)
            .ok_or(GraphError::UnknownNode { id })?
            .pop_forward_guess())
    }

    /// Count one evaluation with `score` against the node.
    ///
    /// Backpropagation is the only caller; nothing else touches the
    /// search statistics.
    pub fn record_visit(&mut self, id: EventId, score: f64) -> Result<(), GraphError> {
        self.nodes
            .get_mut(&id)
            .ok_or(GraphError::UnknownNode { id })?
            .record_visit(score);
        Ok(())
    }

    /// Ids from the top-most ancestor down to `id`, following first parents.
    pub fn chronological_chain(&self, id: EventId) -> Result<Vec<EventId>, GraphError> {
        self.require(id)?;
        let mut chain = vec![id];
        let mut seen = BTreeSet::from([id]);
        let mut current = id;
        while let Some(parent) = self.first_parent_of(current) {
            if !seen.insert(parent) {
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        Ok(chain)
    }

    /// At most `depth` ids ending at `id`, earliest first.
    ///
    /// Same first-parent walk as [`chronological_chain`], cut off after
    /// `depth` nodes. A depth of zero yields an empty chain.
    ///
    /// [`chronological_chain`]: EventGraph::chronological_chain
    pub fn recent_chain(&self, id: EventId, depth: usize) -> Result<Vec<EventId>, GraphError> {
        self.require(id)?;
        let mut chain = Vec::new();
        let mut current = Some(id);
        while chain.len() < depth {
            let Some(node) = current else { break };
            if chain.contains(&node) {
                break;
            }
            chain.push(node);
            current = self.first_parent_of(node);
        }
        chain.reverse();
        Ok(chain)
    }

    /// Texts of the given ids, in the same order.
    pub fn texts(&self, ids: &[EventId]) -> Result<Vec<String>, GraphError> {
        ids.iter()
            .map(|id| self.node(*id).map(|n| n.text().to_owned()))
            .collect()
    }

    /// Texts of the chronological chain ending at `id`.
    pub fn chain_texts(&self, id: EventId) -> Result<Vec<String>, GraphError> {
        self.texts(&self.chronological_chain(id)?)
    }

    /// Nodes with no outgoing edges, in ascending id order.
    pub fn leaf_nodes(&self) -> BTreeSet<EventId> {
        self.nodes
            .keys()
            .copied()
            .filter(|id| self.outgoing(*id).is_empty())
            .collect()
    }

    /// Every simple path from `root` to a node without outgoing edges.
    ///
    /// Paths are grouped by leaf in ascending leaf id. Several paths into
    /// the same leaf keep depth-first order, children taken in insertion
    /// order. A root with no children yields the single path `[root]`.
    pub fn all_root_to_leaf_paths(
        &self,
        root: EventId,
    ) -> Result<Vec<Vec<EventId>>, GraphError> {
        self.require(root)?;
        let mut paths = Vec::new();
        let mut path = vec![root];
        self.collect_paths(&mut path, &mut paths);
        paths.sort_by_key(|p| p.last().copied());
        Ok(paths)
    }

    /// Number of root-to-leaf paths with exactly `length` nodes.
    pub fn count_paths_of_length(&self, root: EventId, length: usize) -> Result<usize, GraphError> {
        Ok(self
            .all_root_to_leaf_paths(root)?
            .iter()
            .filter(|p| p.len() == length)
            .count())
    }

    fn collect_paths(&self, path: &mut Vec<EventId>, out: &mut Vec<Vec<EventId>>) {
        let Some(&current) = path.last() else {
            return;
        };
        let edges = self.outgoing(current);
        if edges.is_empty() {
            out.push(path.clone());
            return;
        }
        for edge in edges {
            if path.contains(&edge.target) {
                continue;
            }
            path.push(edge.target);
            self.collect_paths(path, out);
            path.pop();
        }
    }

    fn outgoing(&self, id: EventId) -> &[Edge] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    fn first_parent_of(&self, id: EventId) -> Option<EventId> {
        self.parents.get(&id).and_then(|p| p.first()).copied()
    }

    pub(crate) fn require(&self, id: EventId) -> Result<(), GraphError> {
        if self.nodes.contains_key(&id) {
            Ok(())
        } else {
            Err(GraphError::UnknownNode { id })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// root(1) -> 2 -> 4
    ///         -> 3
    fn small_tree() -> (EventGraph, EventId) {
        let mut g = EventGraph::new();
        let root = g.create_node("root");
        let a = g.append_child(root, "a").unwrap();
        g.append_child(root, "b").unwrap();
        g.append_child(a, "c").unwrap();
        (g, root)
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let mut g = EventGraph::new();
        let ids: Vec<EventId> = (0..5).map(|i| g.create_node(format!("e{i}"))).collect();
        assert_eq!(ids.first(), Some(&EventId(1)));
        assert!(ids.windows(2).all(|w| w.first() < w.last()));
    }

    #[test]
    fn ids_are_not_reused_after_removal() {
        let mut g = EventGraph::new();
        let a = g.create_node("a");
        let b = g.create_node("b");
        g.remove_node(b).unwrap();
        let c = g.create_node("c");
        assert!(c > b);
        assert!(c > a);
        assert_eq!(g.len(), 2);
    }

    #[test]
    fn new_nodes_start_with_zero_statistics() {
        let mut g = EventGraph::new();
        let id = g.create_node_with_guesses("x", vec!["earlier".to_owned()], Vec::new());
        let node = g.node(id).unwrap();
        assert_eq!(node.text(), "x");
        assert_eq!(node.visit_count(), 0);
        assert!(node.total_score().abs() < f64::EPSILON);
        assert_eq!(node.forward_guess_history(), ["earlier".to_owned()]);
        assert!(node.backward_guess_history().is_empty());
    }

    #[test]
    fn children_keep_insertion_order() {
        let (g, root) = small_tree();
        assert_eq!(g.children_of(root).unwrap(), vec![EventId(2), EventId(3)]);
        assert_eq!(g.parents_of(EventId(4)).unwrap(), vec![EventId(2)]);
        assert_eq!(g.edges_from(root).unwrap().first().map(|e| e.label.as_str()), Some(LEADS_TO));
    }

    #[test]
    fn edge_to_unknown_node_fails() {
        let mut g = EventGraph::new();
        let a = g.create_node("a");
        let err = g.add_edge(a, EventId(99), LEADS_TO);
        assert_eq!(err, Err(GraphError::UnknownNode { id: EventId(99) }));
        let err = g.add_edge(EventId(42), a, LEADS_TO);
        assert_eq!(err, Err(GraphError::UnknownNode { id: EventId(42) }));
        assert!(g.children_of(a).unwrap().is_empty());
    }

    #[test]
    fn append_child_to_unknown_parent_allocates_nothing() {
        let mut g = EventGraph::new();
        assert!(g.append_child(EventId(5), "orphan").is_err());
        assert!(g.is_empty());
        assert_eq!(g.next_id(), EventId::FIRST);
    }

    #[test]
    fn repeated_edge_relabels_instead_of_duplicating() {
        let mut g = EventGraph::new();
        let a = g.create_node("a");
        let b = g.create_node("b");
        g.add_edge(a, b, "x").unwrap();
        g.add_edge(a, b, "y").unwrap();
        let edges = g.edges_from(a).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges.first().map(|e| e.label.as_str()), Some("y"));
        assert_eq!(g.parents_of(b).unwrap(), vec![a]);
    }

    #[test]
    fn remove_node_drops_incident_edges() {
        let (mut g, root) = small_tree();
        let removed = g.remove_node(EventId(2)).unwrap();
        assert_eq!(removed.text(), "a");
        assert_eq!(g.children_of(root).unwrap(), vec![EventId(3)]);
        assert!(g.parents_of(EventId(4)).unwrap().is_empty());
        assert_eq!(
            g.remove_node(EventId(2)),
            Err(GraphError::UnknownNode { id: EventId(2) })
        );
    }

    #[test]
    fn chain_of_root_is_root() {
        let (g, root) = small_tree();
        assert_eq!(g.chronological_chain(root).unwrap(), vec![root]);
    }

    #[test]
    fn chain_is_earliest_first() {
        let (g, _) = small_tree();
        assert_eq!(
            g.chronological_chain(EventId(4)).unwrap(),
            vec![EventId(1), EventId(2), EventId(4)]
        );
        assert_eq!(g.chain_texts(EventId(4)).unwrap(), vec!["root", "a", "c"]);
    }

    #[test]
    fn chain_follows_first_parent() {
        let mut g = EventGraph::new();
        let p1 = g.create_node("p1");
        let p2 = g.create_node("p2");
        let child = g.create_node("child");
        g.add_edge(p2, child, LEADS_TO).unwrap();
        g.add_edge(p1, child, LEADS_TO).unwrap();
        assert_eq!(g.parents_of(child).unwrap(), vec![p2, p1]);
        assert_eq!(g.chronological_chain(child).unwrap(), vec![p2, child]);
    }

    #[test]
    fn chain_terminates_on_cycles() {
        let mut g = EventGraph::new();
        let a = g.create_node("a");
        let b = g.create_node("b");
        g.add_edge(a, b, LEADS_TO).unwrap();
        g.add_edge(b, a, LEADS_TO).unwrap();
        assert_eq!(g.chronological_chain(b).unwrap(), vec![a, b]);
        assert!(g.all_root_to_leaf_paths(a).unwrap().is_empty());
    }

    #[test]
    fn recent_chain_is_bounded() {
        let (g, root) = small_tree();
        assert_eq!(g.recent_chain(EventId(4), 1).unwrap(), vec![EventId(4)]);
        assert_eq!(g.recent_chain(EventId(4), 2).unwrap(), vec![EventId(2), EventId(4)]);
        assert_eq!(g.recent_chain(EventId(4), 10).unwrap().len(), 3);
        assert!(g.recent_chain(root, 0).unwrap().is_empty());
    }

    #[test]
    fn leaves_and_paths() {
        let (g, root) = small_tree();
        assert_eq!(
            g.leaf_nodes().into_iter().collect::<Vec<_>>(),
            vec![EventId(3), EventId(4)]
        );
        assert_eq!(
            g.all_root_to_leaf_paths(root).unwrap(),
            vec![
                vec![EventId(1), EventId(3)],
                vec![EventId(1), EventId(2), EventId(4)],
            ]
        );
        assert_eq!(g.count_paths_of_length(root, 3).unwrap(), 1);
        assert_eq!(g.count_paths_of_length(root, 2).unwrap(), 1);
        assert_eq!(g.count_paths_of_length(root, 4).unwrap(), 0);
    }

    #[test]
    fn lone_root_is_its_own_path() {
        let mut g = EventGraph::new();
        let root = g.create_node("alone");
        assert_eq!(g.all_root_to_leaf_paths(root).unwrap(), vec![vec![root]]);
    }

    #[test]
    fn paths_from_unknown_root_fail() {
        let g = EventGraph::new();
        assert!(g.all_root_to_leaf_paths(EventId(1)).is_err());
    }

    #[test]
    fn record_visit_and_guesses() {
        let (mut g, root) = small_tree();
        g.record_visit(root, 7.0).unwrap();
        g.push_forward_guess(root, "tried").unwrap();
        let node = g.node(root).unwrap();
        assert_eq!(node.visit_count(), 1);
        assert!((node.total_score() - 7.0).abs() < f64::EPSILON);
        assert_eq!(node.forward_guess_history(), ["tried".to_owned()]);
        assert!(g.record_visit(EventId(77), 1.0).is_err());
    }

    #[test]
    fn pop_forward_guess_takes_the_latest() {
        let (mut g, root) = small_tree();
        g.push_forward_guess(root, "first").unwrap();
        g.push_forward_guess(root, "second").unwrap();
        assert_eq!(g.pop_forward_guess(root).unwrap().as_deref(), Some("second"));
        assert_eq!(g.node(root).unwrap().forward_guess_history(), ["first".to_owned()]);
        g.pop_forward_guess(root).unwrap();
        assert_eq!(g.pop_forward_guess(root).unwrap(), None);
        assert!(g.pop_forward_guess(EventId(77)).is_err());
    }
}
