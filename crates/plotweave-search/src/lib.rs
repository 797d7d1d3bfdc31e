//! Monte-Carlo tree search over story event graphs.
//!
//! The search grows an [`EventGraph`](plotweave_graph::EventGraph) from a
//! root event by repeated selection, expansion, rollout simulation and
//! backpropagation. Text generation and scoring are reached only through the
//! port traits in [`ports`], so the engine runs the same against a live LLM
//! backend or the deterministic stubs used in tests.
//!
//! # Modules
//!
//! - [`config`] -- [`SearchConfig`] and its validation
//! - [`ports`] -- Generation, scalar scoring and judge traits plus stubs
//! - [`mcts`] -- The [`MctsSearch`] engine and the UCB1 formula
//! - [`ranking`] -- Path scores, top-k and best-path queries
//! - [`export`] -- Ranked path rows and their comma-separated rendering
//! - [`baseline`] -- The random multibranch chain generator

pub mod baseline;
pub mod config;
pub mod export;
pub mod mcts;
pub mod ports;
pub mod ranking;

pub use baseline::generate_multibranch_chain;
pub use config::{EarlyStop, SearchConfig};
pub use export::{CSV_HEADER, PathRow, csv_line, export_rows, write_csv, write_csv_file};
pub use mcts::{IterationReport, MctsSearch, SearchOutcome, StopReason, backpropagate, ucb1};
pub use ports::{
    ContinuationGenerator, ContinuationRequest, FixedScorer, GenerationError, NEUTRAL_SCORE,
    NeutralJudge, RecordedRequest, ScalarScorer, ScriptedGenerator, StructuredJudge,
};
pub use ranking::{BestPath, ScoredPath, best_path, path_score, ranked_paths, top_k_paths};

use plotweave_graph::GraphError;

/// Errors that end a search run.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The graph rejected an operation.
    #[error("graph error: {source}")]
    Graph {
        /// The underlying graph error.
        #[from]
        source: GraphError,
    },

    /// The generation port failed.
    #[error("{source}")]
    Generation {
        /// The underlying generation error.
        #[from]
        source: GenerationError,
    },

    /// The search configuration cannot be run.
    #[error("invalid search config: {reason}")]
    InvalidConfig {
        /// What is wrong with it.
        reason: String,
    },
}
