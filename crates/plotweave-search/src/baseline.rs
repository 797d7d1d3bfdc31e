//! Random multibranch baseline.
//!
//! The comparison strategy for the search: at every step generate
//! `branching_factor` children of the current node and continue from one
//! picked uniformly at random. No scoring happens along the way.

use plotweave_graph::EventGraph;
use plotweave_types::EventId;
use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::debug;

use crate::SearchError;
use crate::ports::{ContinuationGenerator, ContinuationRequest};

/// Grow a chain from `start` until it holds `narrative_length` nodes.
///
/// Returns the chronological chain of the final node. A start node whose
/// chain is already long enough is returned as is.
///
/// # Errors
///
/// Returns [`SearchError::InvalidConfig`] for a zero branching factor,
/// [`SearchError::Graph`] if `start` is unknown and
/// [`SearchError::Generation`] if the generator fails.
pub async fn generate_multibranch_chain<G, R>(
    graph: &mut EventGraph,
    generator: &G,
    start: EventId,
    narrative_length: usize,
    branching_factor: usize,
    rng: &mut R,
) -> Result<Vec<EventId>, SearchError>
where
    G: ContinuationGenerator,
    R: Rng + Send,
{
    if branching_factor == 0 {
        return Err(SearchError::InvalidConfig {
            reason: "branching_factor must be at least 1".to_owned(),
        });
    }

    let mut current = start;
    loop {
        let chain = graph.chronological_chain(current)?;
        if chain.len() >= narrative_length {
            return Ok(chain);
        }

        let context = graph.texts(&chain)?;
        let mut children = Vec::with_capacity(branching_factor);
        for _ in 0..branching_factor {
            let text = generator
                .generate_continuation(ContinuationRequest::new(&context))
                .await?;
            children.push(graph.append_child(current, text)?);
        }

        let Some(&next) = children.choose(rng) else {
            return Ok(chain);
        };
        debug!(
            from = %current,
            chosen = %next,
            candidates = children.len(),
            "multibranch step"
        );
        current = next;
    }
}
