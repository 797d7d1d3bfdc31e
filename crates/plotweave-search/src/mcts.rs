//! The Monte-Carlo tree search engine.
//!
//! Each iteration runs four phases against one [`EventGraph`]:
//!
//! 1. **Selection** -- descend from the root while the current node already
//!    has `max_children` children, picking the child with the highest
//!    [`ucb1`] value.
//! 2. **Expansion** -- ask the generator for a new continuation of the
//!    frontier and attach it as a permanent child.
//! 3. **Simulation** -- seed a short chain from the new node's ancestors,
//!    extend it with rollout steps on temporary nodes, and score the result.
//! 4. **Backpropagation** -- add the score to every node from the root
//!    through the expanded node.
//!
//! Iterations are strictly sequential. When a generation call fails the
//! run ends with [`SearchError::Generation`] and the graph keeps the state
//! left by the last completed backpropagation.

use plotweave_graph::{EventGraph, TemporaryNode, bullet_list};
use plotweave_types::EventId;
use tracing::{debug, info};

use crate::SearchError;
use crate::config::SearchConfig;
use crate::ports::{ContinuationGenerator, ContinuationRequest, ScalarScorer};

/// Added to child visit counts so unvisited children get a large finite bonus.
pub const UCB_EPSILON: f64 = 1e-6;

/// UCB1 value of a child.
///
/// `average + c * sqrt(ln(parent_visits + 1) / (child_visits + eps))`, with
/// `parent_visits` floored at 1.
pub fn ucb1(average: f64, parent_visits: u32, child_visits: u32, exploration: f64) -> f64 {
    let parent = f64::from(parent_visits.max(1));
    let child = f64::from(child_visits) + UCB_EPSILON;
    average + exploration * ((parent + 1.0).ln() / child).sqrt()
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every configured iteration ran.
    BudgetExhausted,
    /// The early-stop criterion was met.
    EarlyStop {
        /// Paths of the desired length when the run stopped.
        matching_chains: usize,
    },
}

/// Summary of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOutcome {
    /// Iterations that completed backpropagation.
    pub iterations_run: u32,
    /// Permanent nodes added to the graph.
    pub nodes_created: usize,
    /// Why the run ended.
    pub stop_reason: StopReason,
}

/// What one iteration did.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationReport {
    /// Nodes that received the score, root first.
    pub path: Vec<EventId>,
    /// The node simulated from.
    pub expanded: EventId,
    /// Whether `expanded` was created by this iteration.
    pub created: bool,
    /// The simulated score.
    pub score: f64,
}

/// A search bound to one generator and one scorer.
///
/// The engine itself holds no graph; [`run`](Self::run) borrows one
/// mutably, so a single engine can drive many independent graphs.
#[derive(Debug)]
pub struct MctsSearch<'p, G, S> {
    config: SearchConfig,
    generator: &'p G,
    scorer: &'p S,
}

impl<'p, G, S> MctsSearch<'p, G, S>
where
    G: ContinuationGenerator,
    S: ScalarScorer,
{
    /// Create an engine after validating `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidConfig`] if the config is rejected by
    /// [`SearchConfig::validate`].
    pub fn new(config: SearchConfig, generator: &'p G, scorer: &'p S) -> Result<Self, SearchError> {
        config.validate()?;
        Ok(Self {
            config,
            generator,
            scorer,
        })
    }

    /// The engine's configuration.
    pub const fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Run up to `iterations` iterations from `root`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Graph`] if `root` is not in the graph and
    /// [`SearchError::Generation`] if the generator fails.
    pub async fn run(
        &self,
        graph: &mut EventGraph,
        root: EventId,
    ) -> Result<SearchOutcome, SearchError> {
        graph.node(root)?;
        let start_len = graph.len();
        info!(
            root = %root,
            iterations = self.config.iterations,
            max_children = self.config.max_children,
            "search started"
        );

        let mut iterations_run = 0;
        let mut stop_reason = StopReason::BudgetExhausted;
        for iteration in 1..=self.config.iterations {
            let report = self.iterate(graph, root).await?;
            iterations_run = iteration;
            info!(
                iteration,
                expanded = %report.expanded,
                depth = report.path.len(),
                score = report.score,
                "iteration complete"
            );

            if let Some(matching_chains) = self.early_stop_reached(graph, root)? {
                stop_reason = StopReason::EarlyStop { matching_chains };
                break;
            }
        }

        let outcome = SearchOutcome {
            iterations_run,
            nodes_created: graph.len().saturating_sub(start_len),
            stop_reason,
        };
        info!(
            iterations = outcome.iterations_run,
            nodes_created = outcome.nodes_created,
            stop_reason = ?outcome.stop_reason,
            "search finished"
        );
        Ok(outcome)
    }

    /// Run one select/expand/simulate/backpropagate cycle.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Generation`] if expansion or a rollout step
    /// fails. Nothing is backpropagated in that case; a child created by
    /// this iteration is removed again and its text is dropped from the
    /// frontier's forward guess history.
    pub async fn iterate(
        &self,
        graph: &mut EventGraph,
        root: EventId,
    ) -> Result<IterationReport, SearchError> {
        let mut path = self.select(graph, root)?;
        let frontier = path.last().copied().unwrap_or(root);
        let expanded = self.expand(graph, frontier).await?;
        let created = expanded != frontier;
        let score = match self.simulate(graph, expanded).await {
            Ok(score) => score,
            Err(e) => {
                if created {
                    graph.remove_node(expanded)?;
                    graph.pop_forward_guess(frontier)?;
                }
                return Err(e);
            }
        };

        if created {
            path.push(expanded);
        }
        backpropagate(graph, &path, score)?;

        Ok(IterationReport {
            path,
            expanded,
            created,
            score,
        })
    }

    /// Walk from `root` to the first node with room for another child.
    ///
    /// Returns the visited path, root first.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Graph`] if `root` is not in the graph.
    pub fn select(&self, graph: &EventGraph, root: EventId) -> Result<Vec<EventId>, SearchError> {
        let mut path = vec![root];
        let mut current = root;
        loop {
            let children = graph.children_of(current)?;
            if children.len() < self.config.max_children {
                break;
            }

            let parent_visits = graph.node(current)?.visit_count();
            let mut best = None;
            let mut best_value = f64::NEG_INFINITY;
            for child in children {
                let node = graph.node(child)?;
                let value = ucb1(
                    node.average_score(),
                    parent_visits,
                    node.visit_count(),
                    self.config.exploration_constant,
                );
                if value > best_value {
                    best_value = value;
                    best = Some(child);
                }
            }

            match best {
                Some(next) if !path.contains(&next) => {
                    path.push(next);
                    current = next;
                }
                _ => break,
            }
        }
        Ok(path)
    }

    /// Attach a newly generated child to `frontier`.
    ///
    /// A frontier that already has `max_children` children is returned
    /// unchanged without calling the generator.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Generation`] if the generator fails, leaving
    /// the graph untouched.
    pub async fn expand(
        &self,
        graph: &mut EventGraph,
        frontier: EventId,
    ) -> Result<EventId, SearchError> {
        if graph.child_count(frontier)? >= self.config.max_children {
            debug!(frontier = %frontier, "frontier full, skipping expansion");
            return Ok(frontier);
        }

        let context = graph.chain_texts(frontier)?;
        let prior_attempts = graph.node(frontier)?.forward_guess_history().to_vec();
        let request = ContinuationRequest {
            context: &context,
            prior_attempts: &prior_attempts,
            extra_context: self.config.generation_context.as_deref(),
        };
        let text = self.generator.generate_continuation(request).await?;

        graph.push_forward_guess(frontier, text.clone())?;
        let child = graph.append_child(frontier, text)?;
        debug!(
            frontier = %frontier,
            child = %child,
            siblings = prior_attempts.len(),
            "expanded"
        );
        Ok(child)
    }

    /// Roll out from `node` and score the resulting chain.
    ///
    /// Rollout steps run on temporary nodes that are gone again before this
    /// returns, whether the step succeeded or not.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Generation`] if a rollout step fails.
    pub async fn simulate(&self, graph: &mut EventGraph, node: EventId) -> Result<f64, SearchError> {
        let seed = graph.recent_chain(node, self.config.scoring_depth)?;
        let mut chain = graph.texts(&seed)?;

        for step in 0..self.config.rollout_depth {
            let Some(last) = chain.last().cloned() else {
                break;
            };
            let temp = TemporaryNode::create(graph, last);
            let context = temp.chain_texts();
            let generated = self
                .generator
                .generate_continuation(ContinuationRequest::new(&context))
                .await;
            drop(temp);

            let generated = generated?;
            let text = generated.trim();
            if text.is_empty() {
                debug!(node = %node, step, "rollout produced empty text, stopping");
                break;
            }
            chain.push(text.to_owned());
        }

        let document = bullet_list(&chain);
        let score = self
            .scorer
            .score_scalar(&document, self.config.scoring_constraints.as_deref())
            .await;
        debug!(node = %node, chain_len = chain.len(), score, "simulated");
        Ok(score)
    }

    fn early_stop_reached(
        &self,
        graph: &EventGraph,
        root: EventId,
    ) -> Result<Option<usize>, SearchError> {
        let Some(stop) = self.config.early_stop else {
            return Ok(None);
        };
        let matching = graph.count_paths_of_length(root, stop.desired_chain_length)?;
        Ok((matching >= stop.min_num_chains).then_some(matching))
    }
}

/// Record one visit with `score` on every node of `path`.
///
/// All ids are checked before any node is updated.
///
/// # Errors
///
/// Returns [`SearchError::Graph`] if any id is unknown.
pub fn backpropagate(graph: &mut EventGraph, path: &[EventId], score: f64) -> Result<(), SearchError> {
    for id in path {
        graph.node(*id)?;
    }
    for id in path {
        graph.record_visit(*id, score)?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ports::{FixedScorer, ScriptedGenerator};

    #[test]
    fn unvisited_child_dominates() {
        let unvisited = ucb1(0.0, 10, 0, 0.7);
        let visited = ucb1(10.0, 10, 5, 0.7);
        assert!(unvisited > visited);
    }

    #[test]
    fn parent_visits_are_floored_at_one() {
        assert!((ucb1(3.0, 0, 1, 0.7) - ucb1(3.0, 1, 1, 0.7)).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_exploration_is_pure_average() {
        assert!((ucb1(6.5, 4, 2, 0.0) - 6.5).abs() < f64::EPSILON);
    }

    #[test]
    fn select_stops_at_unfilled_root() {
        let generator = ScriptedGenerator::numbered("e{n}");
        let scorer = FixedScorer::new(5.0);
        let search = MctsSearch::new(SearchConfig::default(), &generator, &scorer).unwrap();
        let mut g = EventGraph::new();
        let root = g.create_node("root");
        g.append_child(root, "a").unwrap();
        assert_eq!(search.select(&g, root).unwrap(), vec![root]);
    }

    #[test]
    fn select_prefers_higher_average() {
        let generator = ScriptedGenerator::numbered("e{n}");
        let scorer = FixedScorer::new(5.0);
        let config = SearchConfig {
            max_children: 2,
            ..SearchConfig::default()
        };
        let search = MctsSearch::new(config, &generator, &scorer).unwrap();
        let mut g = EventGraph::new();
        let root = g.create_node("root");
        let weak = g.append_child(root, "weak").unwrap();
        let strong = g.append_child(root, "strong").unwrap();
        backpropagate(&mut g, &[root, weak], 2.0).unwrap();
        backpropagate(&mut g, &[root, strong], 9.0).unwrap();
        assert_eq!(search.select(&g, root).unwrap(), vec![root, strong]);
    }

    #[test]
    fn select_breaks_ties_by_insertion_order() {
        let generator = ScriptedGenerator::numbered("e{n}");
        let scorer = FixedScorer::new(5.0);
        let config = SearchConfig {
            max_children: 2,
            ..SearchConfig::default()
        };
        let search = MctsSearch::new(config, &generator, &scorer).unwrap();
        let mut g = EventGraph::new();
        let root = g.create_node("root");
        let first = g.append_child(root, "first").unwrap();
        g.append_child(root, "second").unwrap();
        assert_eq!(search.select(&g, root).unwrap(), vec![root, first]);
    }

    #[tokio::test]
    async fn full_frontier_is_not_expanded() {
        let generator = ScriptedGenerator::numbered("e{n}");
        let scorer = FixedScorer::new(5.0);
        let config = SearchConfig {
            max_children: 1,
            ..SearchConfig::default()
        };
        let search = MctsSearch::new(config, &generator, &scorer).unwrap();
        let mut g = EventGraph::new();
        let root = g.create_node("root");
        g.append_child(root, "only").unwrap();
        assert_eq!(search.expand(&mut g, root).await.unwrap(), root);
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn expansion_records_forward_guess_and_passes_extra_context() {
        let generator = ScriptedGenerator::numbered("e{n}");
        let scorer = FixedScorer::new(5.0);
        let config = SearchConfig {
            generation_context: Some("keep it grim".to_owned()),
            ..SearchConfig::default()
        };
        let search = MctsSearch::new(config, &generator, &scorer).unwrap();
        let mut g = EventGraph::new();
        let root = g.create_node("root");
        let child = search.expand(&mut g, root).await.unwrap();

        assert_eq!(g.node(child).unwrap().text(), "e1");
        assert_eq!(g.node(root).unwrap().forward_guess_history(), ["e1".to_owned()]);
        let requests = generator.requests();
        assert_eq!(requests[0].context, vec!["root".to_owned()]);
        assert_eq!(requests[0].extra_context.as_deref(), Some("keep it grim"));
    }

    #[tokio::test]
    async fn simulation_scores_seed_plus_rollout() {
        let generator = ScriptedGenerator::numbered("  step {n}  ");
        let scorer = FixedScorer::new(8.0);
        let config = SearchConfig {
            scoring_depth: 2,
            rollout_depth: 2,
            ..SearchConfig::default()
        };
        let search = MctsSearch::new(config, &generator, &scorer).unwrap();
        let mut g = EventGraph::new();
        let root = g.create_node("root");
        let child = g.append_child(root, "child").unwrap();
        let len_before = g.len();

        let score = search.simulate(&mut g, child).await.unwrap();

        assert!((score - 8.0).abs() < f64::EPSILON);
        assert_eq!(g.len(), len_before);
        assert_eq!(
            scorer.documents(),
            vec!["- root\n- child\n- step 1\n- step 2".to_owned()]
        );
        let requests = generator.requests();
        assert_eq!(requests[0].context, vec!["child".to_owned()]);
        assert!(requests[0].prior_attempts.is_empty());
        assert_eq!(requests[1].context, vec!["step 1".to_owned()]);
    }

    #[tokio::test]
    async fn empty_rollout_text_ends_rollout() {
        let generator = ScriptedGenerator::numbered("   ");
        let scorer = FixedScorer::new(5.0);
        let config = SearchConfig {
            rollout_depth: 3,
            ..SearchConfig::default()
        };
        let search = MctsSearch::new(config, &generator, &scorer).unwrap();
        let mut g = EventGraph::new();
        let root = g.create_node("root");
        search.simulate(&mut g, root).await.unwrap();
        assert_eq!(generator.calls(), 1);
        assert_eq!(scorer.documents(), vec!["- root".to_owned()]);
    }

    #[test]
    fn backpropagate_checks_every_id_first() {
        let mut g = EventGraph::new();
        let root = g.create_node("root");
        let result = backpropagate(&mut g, &[root, EventId(99)], 4.0);
        assert!(matches!(result, Err(SearchError::Graph { .. })));
        assert_eq!(g.node(root).unwrap().visit_count(), 0);
    }
}
