//! Evaluation harness for the Plotweave story search.
//!
//! Grows every story stub with the multibranch baseline and with each
//! configured MCTS variant, judges the resulting narratives, and writes CSV
//! and JSON reports per narrative length.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load the experiment from `plotweave.yaml` (or `PLOTWEAVE_CONFIG`)
//! 3. Load the oracle settings from the environment
//! 4. Read the story stubs
//! 5. Run every narrative length and write its reports
//!
//! With `LLM_BACKEND=stub` no model is contacted: events are numbered
//! placeholders, every rollout scores 5 and every verdict is neutral.

mod config;
mod error;
mod harness;
mod report;

use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use plotweave_oracle::{BackendType, LlmOracle, OracleConfig};
use plotweave_search::{
    ContinuationGenerator, FixedScorer, NEUTRAL_SCORE, NeutralJudge, ScalarScorer,
    ScriptedGenerator, StructuredJudge,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::ExperimentConfig;
use crate::error::HarnessError;
use crate::harness::{Ports, plan_jobs, read_stubs, run_jobs};
use crate::report::{length_dir, write_reports};

/// Default experiment file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "plotweave.yaml";

/// Application entry point for the harness.
///
/// # Errors
///
/// Returns an error if configuration, stub loading or report writing
/// fails. Individual job failures are reported as rows instead.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize structured logging.
    init_tracing();
    info!("plotweave-harness starting");

    // 2. Load the experiment.
    let config = load_config().context("loading experiment config")?;
    info!(
        stubs_file = %config.stubs_file.display(),
        output_dir = %config.output_dir.display(),
        max_workers = config.max_workers,
        narrative_lengths = ?config.narrative_lengths,
        mcts_configs = config.mcts.len(),
        "Configuration loaded"
    );

    // 3. Load oracle settings.
    let oracle_config =
        load_oracle_config(|name| std::env::var(name).ok()).context("loading LLM settings")?;

    // 4. Read stubs.
    let stubs = read_stubs(&config.stubs_file).context("reading story stubs")?;
    info!(stubs = stubs.len(), "Story stubs loaded");

    // 5. Run.
    if oracle_config.backend == BackendType::Stub {
        info!("Using stub backend");
        let generator = ScriptedGenerator::numbered("Stub event {n}.");
        let scorer = FixedScorer::new(NEUTRAL_SCORE);
        let ports = Ports {
            generator: &generator,
            scorer: &scorer,
            judge: &NeutralJudge,
        };
        run_experiment(ports, &config, &stubs).await?;
    } else {
        let oracle = build_oracle(&oracle_config).context("building LLM oracle")?;
        info!(backend = oracle.backend_name(), "LLM oracle ready");
        let ports = Ports {
            generator: &oracle,
            scorer: &oracle,
            judge: &oracle,
        };
        run_experiment(ports, &config, &stubs).await?;
    }

    info!("plotweave-harness finished");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Run every narrative length and write its reports.
async fn run_experiment<G, S, J>(
    ports: Ports<'_, G, S, J>,
    config: &ExperimentConfig,
    stubs: &[String],
) -> Result<(), HarnessError>
where
    G: ContinuationGenerator,
    S: ScalarScorer,
    J: StructuredJudge,
{
    for &narrative_length in &config.narrative_lengths {
        let jobs = plan_jobs(stubs, config, narrative_length);
        info!(narrative_length, jobs = jobs.len(), "Running narrative length");

        let started_at = Utc::now();
        let rows = run_jobs(ports, &jobs, config).await;
        let dir = length_dir(&config.output_dir, narrative_length);
        let summary = write_reports(&dir, narrative_length, &rows, started_at)?;
        for strategy in &summary.strategies {
            info!(
                narrative_length,
                strategy = %strategy.strategy,
                avg_score = strategy.avg_score,
                failed = strategy.failed,
                "Strategy result"
            );
        }
    }
    Ok(())
}

/// Load the experiment file, falling back to defaults when it is absent.
fn load_config() -> Result<ExperimentConfig, HarnessError> {
    let config_path = std::env::var("PLOTWEAVE_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    if config_path.exists() {
        Ok(ExperimentConfig::from_file(&config_path)?)
    } else {
        info!(path = %config_path.display(), "Config file not found, using defaults");
        Ok(ExperimentConfig::default())
    }
}

/// Oracle settings read through `lookup`.
fn load_oracle_config<F>(lookup: F) -> Result<OracleConfig, HarnessError>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(OracleConfig::from_lookup(lookup)?)
}

/// The HTTP oracle used for every port when the backend is not `stub`.
fn build_oracle(config: &OracleConfig) -> Result<LlmOracle, HarnessError> {
    Ok(LlmOracle::from_config(config)?)
}
