//! Shared type definitions for the Plotweave story search.
//!
//! This crate holds the small vocabulary every other crate in the workspace
//! agrees on.
//!
//! # Modules
//!
//! - [`ids`] -- Event node ids and harness run ids
//! - [`judgement`] -- The seven-dimension judge record and its fallback

pub mod ids;
pub mod judgement;

// Re-export all public types at crate root for convenience.
pub use ids::{EventId, RunId};
pub use judgement::{
    DIMENSION_NAMES, JudgeScores, JudgeVerdict, MAX_DIMENSION_SCORE, MIN_DIMENSION_SCORE,
    NEUTRAL_DIMENSION_SCORE,
};
