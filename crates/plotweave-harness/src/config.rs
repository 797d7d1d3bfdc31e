//! Experiment configuration.
//!
//! The experiment lives in a YAML file (default `plotweave.yaml`, overridden
//! by `PLOTWEAVE_CONFIG`). Every field has a default, so an empty file runs
//! one MCTS configuration and the two usual baseline factors over
//! `stubs.txt`.

use std::path::{Path, PathBuf};

use plotweave_search::SearchConfig;
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but cannot be run.
    #[error("invalid experiment config: {reason}")]
    Invalid {
        /// What is wrong with it.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level experiment configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExperimentConfig {
    /// File with one story stub per non-empty line.
    #[serde(default = "default_stubs_file")]
    pub stubs_file: PathBuf,

    /// Directory that receives the reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Jobs in flight at once.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Target chain lengths; each gets its own output folder.
    #[serde(default = "default_narrative_lengths")]
    pub narrative_lengths: Vec<usize>,

    /// Chains of the target length that end an MCTS run, and how many of
    /// the top paths the judge scores.
    #[serde(default = "default_min_num_chains")]
    pub min_num_chains: usize,

    /// Seed for baseline branch choices. Unset means OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Branching factors for the multibranch baseline.
    #[serde(default = "default_multibranch_factors")]
    pub multibranch_factors: Vec<usize>,

    /// MCTS configurations to compare.
    #[serde(default = "default_mcts")]
    pub mcts: Vec<SearchConfig>,

    /// Scorer constraints applied to MCTS configs that set none.
    #[serde(default)]
    pub scoring_constraints: Option<String>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            stubs_file: default_stubs_file(),
            output_dir: default_output_dir(),
            max_workers: default_max_workers(),
            narrative_lengths: default_narrative_lengths(),
            min_num_chains: default_min_num_chains(),
            seed: None,
            multibranch_factors: default_multibranch_factors(),
            mcts: default_mcts(),
            scoring_constraints: None,
        }
    }
}

impl ExperimentConfig {
    /// Load and validate configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// MCTS configurations with the shared scoring constraints filled in.
    pub fn mcts_configs(&self) -> Vec<SearchConfig> {
        self.mcts
            .iter()
            .cloned()
            .map(|mut config| {
                if config.scoring_constraints.is_none() {
                    config.scoring_constraints.clone_from(&self.scoring_constraints);
                }
                config
            })
            .collect()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers == 0 {
            return Err(invalid("max_workers must be at least 1"));
        }
        if self.min_num_chains == 0 {
            return Err(invalid("min_num_chains must be at least 1"));
        }
        if self.narrative_lengths.is_empty() || self.narrative_lengths.contains(&0) {
            return Err(invalid("narrative_lengths must be non-empty and positive"));
        }
        if self.multibranch_factors.contains(&0) {
            return Err(invalid("multibranch_factors must be positive"));
        }
        for (index, config) in self.mcts.iter().enumerate() {
            config
                .validate()
                .map_err(|e| invalid(format!("mcts[{index}]: {e}")))?;
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.into(),
    }
}

fn default_stubs_file() -> PathBuf {
    PathBuf::from("stubs.txt")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

const fn default_max_workers() -> usize {
    4
}

fn default_narrative_lengths() -> Vec<usize> {
    vec![10]
}

const fn default_min_num_chains() -> usize {
    2
}

fn default_multibranch_factors() -> Vec<usize> {
    vec![3, 6]
}

fn default_mcts() -> Vec<SearchConfig> {
    vec![SearchConfig {
        max_children: 3,
        iterations: 40,
        ..SearchConfig::default()
    }]
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = ExperimentConfig::parse("").unwrap();
        assert_eq!(config, ExperimentConfig::default());
        assert_eq!(config.stubs_file, PathBuf::from("stubs.txt"));
        assert_eq!(config.multibranch_factors, vec![3, 6]);
    }

    #[test]
    fn parses_strategies() {
        let yaml = r"
stubs_file: data/stubs.txt
output_dir: out
max_workers: 8
narrative_lengths: [6, 10]
min_num_chains: 3
seed: 42
multibranch_factors: [1]
mcts:
  - max_children: 2
    iterations: 100
  - max_children: 4
    iterations: 50
    scoring_depth: 3
    scoring_constraints: no magic
scoring_constraints: keep it grounded
";
        let config = ExperimentConfig::parse(yaml).unwrap();
        assert_eq!(config.narrative_lengths, vec![6, 10]);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.mcts.len(), 2);
        assert_eq!(config.mcts[1].scoring_depth, 3);
        assert_eq!(config.mcts[0].rollout_depth, 2);

        let resolved = config.mcts_configs();
        assert_eq!(resolved[0].scoring_constraints.as_deref(), Some("keep it grounded"));
        assert_eq!(resolved[1].scoring_constraints.as_deref(), Some("no magic"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        for yaml in [
            "max_workers: 0",
            "min_num_chains: 0",
            "narrative_lengths: []",
            "multibranch_factors: [0]",
            "mcts:\n  - max_children: 0",
        ] {
            assert!(
                matches!(ExperimentConfig::parse(yaml), Err(ConfigError::Invalid { .. })),
                "accepted {yaml:?}"
            );
        }
    }

    #[test]
    fn malformed_yaml_is_a_yaml_error() {
        assert!(matches!(
            ExperimentConfig::parse("max_workers: [unclosed"),
            Err(ConfigError::Yaml { .. })
        ));
    }
}
