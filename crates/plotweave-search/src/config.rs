//! Search configuration.
//!
//! [`SearchConfig`] deserializes from any serde format with every field
//! optional, so a harness YAML block only needs the knobs it changes.

use serde::{Deserialize, Serialize};

use crate::SearchError;

/// Default UCB1 exploration constant.
pub const DEFAULT_EXPLORATION_CONSTANT: f64 = 0.7;

/// Tunables for one [`MctsSearch`](crate::MctsSearch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Children a node must have before selection descends past it.
    #[serde(default = "default_max_children")]
    pub max_children: usize,

    /// Iteration budget for one run.
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// Ancestor texts (inclusive) that seed the rollout chain.
    #[serde(default = "default_scoring_depth")]
    pub scoring_depth: usize,

    /// Maximum generated steps per rollout.
    #[serde(default = "default_rollout_depth")]
    pub rollout_depth: usize,

    /// UCB1 exploration constant `C`.
    #[serde(default = "default_exploration_constant")]
    pub exploration_constant: f64,

    /// Extra instructions passed to the scalar scorer.
    #[serde(default)]
    pub scoring_constraints: Option<String>,

    /// Extra instructions passed to the generator during expansion.
    #[serde(default)]
    pub generation_context: Option<String>,

    /// Stop once enough chains of a given length exist.
    #[serde(default)]
    pub early_stop: Option<EarlyStop>,
}

/// Early-stop criterion checked after every iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarlyStop {
    /// Node count of the root-to-leaf paths being counted.
    pub desired_chain_length: usize,
    /// How many such paths end the run.
    pub min_num_chains: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_children: default_max_children(),
            iterations: default_iterations(),
            scoring_depth: default_scoring_depth(),
            rollout_depth: default_rollout_depth(),
            exploration_constant: default_exploration_constant(),
            scoring_constraints: None,
            generation_context: None,
            early_stop: None,
        }
    }
}

impl SearchConfig {
    /// Return a copy with early stopping set.
    #[must_use]
    pub const fn with_early_stop(mut self, desired_chain_length: usize, min_num_chains: usize) -> Self {
        self.early_stop = Some(EarlyStop {
            desired_chain_length,
            min_num_chains,
        });
        self
    }

    /// Reject configurations the search cannot make progress with.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidConfig`] when `max_children` is zero,
    /// the exploration constant is negative or not finite, or an early-stop
    /// criterion asks for zero-length chains or zero chains.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.max_children == 0 {
            return Err(invalid("max_children must be at least 1"));
        }
        if !self.exploration_constant.is_finite() || self.exploration_constant < 0.0 {
            return Err(invalid(format!(
                "exploration_constant must be a finite non-negative number, got {}",
                self.exploration_constant
            )));
        }
        if let Some(stop) = self.early_stop {
            if stop.desired_chain_length == 0 {
                return Err(invalid("early_stop.desired_chain_length must be at least 1"));
            }
            if stop.min_num_chains == 0 {
                return Err(invalid("early_stop.min_num_chains must be at least 1"));
            }
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> SearchError {
    SearchError::InvalidConfig {
        reason: reason.into(),
    }
}

const fn default_max_children() -> usize {
    3
}

const fn default_iterations() -> u32 {
    10
}

const fn default_scoring_depth() -> usize {
    1
}

const fn default_rollout_depth() -> usize {
    2
}

const fn default_exploration_constant() -> f64 {
    DEFAULT_EXPLORATION_CONSTANT
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = SearchConfig::default();
        assert_eq!(config.max_children, 3);
        assert_eq!(config.scoring_depth, 1);
        assert_eq!(config.rollout_depth, 2);
        assert!((config.exploration_constant - 0.7).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_document_fills_defaults() {
        let config: SearchConfig =
            serde_json::from_str(r#"{"max_children": 2, "iterations": 40}"#).unwrap();
        assert_eq!(config.max_children, 2);
        assert_eq!(config.iterations, 40);
        assert_eq!(config.rollout_depth, 2);
        assert!(config.early_stop.is_none());
    }

    #[test]
    fn zero_max_children_is_rejected() {
        let config = SearchConfig {
            max_children: 0,
            ..SearchConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SearchError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn bad_exploration_constant_is_rejected() {
        for c in [-0.1, f64::NAN, f64::INFINITY] {
            let config = SearchConfig {
                exploration_constant: c,
                ..SearchConfig::default()
            };
            assert!(config.validate().is_err(), "accepted {c}");
        }
    }

    #[test]
    fn degenerate_early_stop_is_rejected() {
        assert!(SearchConfig::default().with_early_stop(0, 1).validate().is_err());
        assert!(SearchConfig::default().with_early_stop(3, 0).validate().is_err());
        assert!(SearchConfig::default().with_early_stop(3, 1).validate().is_ok());
    }
}
