//! Event nodes and labelled edges.

use plotweave_types::EventId;

/// One event in the story graph.
///
/// The text is fixed at creation. Search statistics (`visit_count`,
/// `total_score`) start at zero and only change through
/// [`EventGraph::record_visit`](crate::EventGraph::record_visit).
#[derive(Debug, Clone, PartialEq)]
pub struct EventNode {
    id: EventId,
    text: String,
    forward_guesses: Vec<String>,
    backward_guesses: Vec<String>,
    visit_count: u32,
    total_score: f64,
}

impl EventNode {
    pub(crate) const fn new(
        id: EventId,
        text: String,
        forward_guesses: Vec<String>,
        backward_guesses: Vec<String>,
    ) -> Self {
        Self {
            id,
            text,
            forward_guesses,
            backward_guesses,
            visit_count: 0,
            total_score: 0.0,
        }
    }

    /// The node's id.
    pub const fn id(&self) -> EventId {
        self.id
    }

    /// The event text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Continuations previously generated from this node, oldest first.
    ///
    /// Expansion feeds this list back to the generator so that new children
    /// diverge from earlier siblings.
    pub fn forward_guess_history(&self) -> &[String] {
        &self.forward_guesses
    }

    /// Previously generated antecedents. Reserved; the search never writes it.
    pub fn backward_guess_history(&self) -> &[String] {
        &self.backward_guesses
    }

    /// Number of backpropagated evaluations through this node.
    pub const fn visit_count(&self) -> u32 {
        self.visit_count
    }

    /// Sum of backpropagated scores.
    pub const fn total_score(&self) -> f64 {
        self.total_score
    }

    /// `total_score / visit_count`, or 0.0 for an unvisited node.
    pub fn average_score(&self) -> f64 {
        if self.visit_count == 0 {
            0.0
        } else {
            self.total_score / f64::from(self.visit_count)
        }
    }

    pub(crate) fn push_forward_guess(&mut self, text: String) {
        self.forward_guesses.push(text);
    }

    pub(crate) fn pop_forward_guess(&mut self) -> Option<String> {
        self.forward_guesses.pop()
    }

    pub(crate) fn record_visit(&mut self, score: f64) {
        self.visit_count = self.visit_count.saturating_add(1);
        self.total_score += score;
    }
}

/// An outgoing edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    /// The child end of the edge.
    pub target: EventId,
    /// Relationship label, e.g. `"leads to"`.
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unvisited_average_is_zero() {
        let node = EventNode::new(EventId(1), "x".to_owned(), Vec::new(), Vec::new());
        assert_eq!(node.visit_count(), 0);
        assert!(node.average_score().abs() < f64::EPSILON);
    }

    #[test]
    fn average_tracks_visits() {
        let mut node = EventNode::new(EventId(1), "x".to_owned(), Vec::new(), Vec::new());
        node.record_visit(6.0);
        node.record_visit(8.0);
        assert_eq!(node.visit_count(), 2);
        assert!((node.total_score() - 14.0).abs() < f64::EPSILON);
        assert!((node.average_score() - 7.0).abs() < f64::EPSILON);
    }
}
