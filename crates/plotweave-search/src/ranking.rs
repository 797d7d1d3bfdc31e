//! Path scoring and ranking.
//!
//! A path's score is the mean of its nodes' average scores. Unvisited nodes
//! count as 0.0, so long speculative branches the search never returned to
//! rank below well-explored ones.

use plotweave_graph::{EventGraph, GraphError};
use plotweave_types::EventId;
use serde::Serialize;

/// A root-to-leaf path with its score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredPath {
    /// Node ids, root first.
    pub path: Vec<EventId>,
    /// Mean average score over the path.
    pub score: f64,
}

/// The highest-ranked path and its rendered text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestPath {
    /// Node ids, root first.
    pub path: Vec<EventId>,
    /// Mean average score over the path.
    pub score: f64,
    /// The path as `- text` lines.
    pub bullets: String,
}

/// Mean of the nodes' average scores; 0.0 for an empty path.
///
/// # Errors
///
/// Returns [`GraphError::UnknownNode`] if any id is not in the graph.
pub fn path_score(graph: &EventGraph, path: &[EventId]) -> Result<f64, GraphError> {
    if path.is_empty() {
        return Ok(0.0);
    }
    let mut sum = 0.0;
    for id in path {
        sum += graph.node(*id)?.average_score();
    }
    Ok(sum / count_as_f64(path.len()))
}

/// Every root-to-leaf path, best first.
///
/// The sort is stable, so equal scores keep enumeration order: the path
/// ending at the lower leaf id comes first.
///
/// # Errors
///
/// Returns [`GraphError::UnknownNode`] if `root` is not in the graph.
pub fn ranked_paths(graph: &EventGraph, root: EventId) -> Result<Vec<ScoredPath>, GraphError> {
    let mut scored = graph
        .all_root_to_leaf_paths(root)?
        .into_iter()
        .map(|path| {
            let score = path_score(graph, &path)?;
            Ok(ScoredPath { path, score })
        })
        .collect::<Result<Vec<_>, GraphError>>()?;
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    Ok(scored)
}

/// The `k` best root-to-leaf paths.
///
/// Asking for more paths than exist returns all of them.
///
/// # Errors
///
/// Returns [`GraphError::UnknownNode`] if `root` is not in the graph.
pub fn top_k_paths(
    graph: &EventGraph,
    root: EventId,
    k: usize,
) -> Result<Vec<ScoredPath>, GraphError> {
    let mut ranked = ranked_paths(graph, root)?;
    ranked.truncate(k);
    Ok(ranked)
}

/// The best root-to-leaf path, or the root alone when it has no children.
///
/// # Errors
///
/// Returns [`GraphError::UnknownNode`] if `root` is not in the graph.
pub fn best_path(graph: &EventGraph, root: EventId) -> Result<BestPath, GraphError> {
    let top = match top_k_paths(graph, root, 1)?.into_iter().next() {
        Some(top) => top,
        None => ScoredPath {
            path: vec![root],
            score: path_score(graph, &[root])?,
        },
    };
    let bullets = graph.render_bullets(&top.path)?;
    Ok(BestPath {
        path: top.path,
        score: top.score,
        bullets,
    })
}

#[allow(clippy::cast_precision_loss)]
const fn count_as_f64(n: usize) -> f64 {
    n as f64
}
