//! Job planning and execution.
//!
//! For one narrative length every story stub is run through every baseline
//! branching factor and every MCTS configuration. Each job owns a fresh
//! [`EventGraph`] rooted at its stub, so jobs share nothing but the ports and
//! run as concurrent futures bounded by `max_workers`.
//!
//! A job that fails does not stop the run. It becomes an error row with a
//! placeholder narrative and zero scores.

use std::path::Path;

use futures::StreamExt;
use plotweave_graph::EventGraph;
use plotweave_search::{
    ContinuationGenerator, MctsSearch, PathRow, ScalarScorer, SearchConfig, SearchError,
    StructuredJudge, export_rows, generate_multibranch_chain, top_k_paths,
};
use plotweave_types::{EventId, JudgeVerdict, RunId};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};

use crate::config::ExperimentConfig;
use crate::error::HarnessError;

/// Narrative written for jobs that failed.
pub const NO_NARRATIVE: &str = "<No narrative>";

/// Number of judged dimensions.
pub const DIMENSIONS: usize = 7;

/// Read story stubs: one per non-empty line, trimmed.
///
/// # Errors
///
/// Returns [`HarnessError::Io`] if the file cannot be read and
/// [`HarnessError::NoStubs`] if it holds no stubs.
pub fn read_stubs(path: &Path) -> Result<Vec<String>, HarnessError> {
    let contents = std::fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
    let stubs = parse_stubs(&contents);
    if stubs.is_empty() {
        return Err(HarnessError::NoStubs {
            path: path.to_path_buf(),
        });
    }
    Ok(stubs)
}

/// Non-empty trimmed lines of `contents`.
pub fn parse_stubs(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

/// How a job grows its story.
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    /// One chain, picking uniformly among `branching_factor` candidates.
    Multibranch {
        /// Candidates generated per step.
        branching_factor: usize,
    },
    /// Monte Carlo tree search.
    Mcts {
        /// Position of the configuration in the experiment file.
        index: usize,
        /// The search parameters.
        config: SearchConfig,
    },
}

impl Strategy {
    /// Report label, e.g. `mcts (max_children=3, iterations=40, scoring_depth=1)`.
    pub fn label(&self) -> String {
        match self {
            Self::Multibranch { branching_factor } => {
                format!("baseline-multibranch (N={branching_factor})")
            }
            Self::Mcts { config, .. } => format!(
                "mcts (max_children={}, iterations={}, scoring_depth={})",
                config.max_children, config.iterations, config.scoring_depth
            ),
        }
    }
}

/// One stub under one strategy at one narrative length.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    /// Position in the plan; rows come back in this order.
    pub index: usize,
    /// Target chain length, root included.
    pub narrative_length: usize,
    /// Position of the stub in the stubs file.
    pub stub_index: usize,
    /// The story stub, used as the root event.
    pub stub: String,
    /// How the story is grown.
    pub strategy: Strategy,
}

/// Every job for `narrative_length`, stub by stub, baselines first.
pub fn plan_jobs(stubs: &[String], config: &ExperimentConfig, narrative_length: usize) -> Vec<Job> {
    let mcts = config.mcts_configs();
    let strategies: Vec<Strategy> = config
        .multibranch_factors
        .iter()
        .map(|&branching_factor| Strategy::Multibranch { branching_factor })
        .chain(
            mcts.into_iter()
                .enumerate()
                .map(|(index, config)| Strategy::Mcts { index, config }),
        )
        .collect();

    stubs
        .iter()
        .enumerate()
        .flat_map(|(stub_index, stub)| {
            strategies.iter().map(move |strategy| (stub_index, stub, strategy))
        })
        .enumerate()
        .map(|(index, (stub_index, stub, strategy))| Job {
            index,
            narrative_length,
            stub_index,
            stub: stub.clone(),
            strategy: strategy.clone(),
        })
        .collect()
}

/// The three ports a job talks to.
#[derive(Debug)]
pub struct Ports<'a, G, S, J> {
    /// Produces candidate events.
    pub generator: &'a G,
    /// Scores rollouts during MCTS.
    pub scorer: &'a S,
    /// Rates finished narratives.
    pub judge: &'a J,
}

impl<G, S, J> Clone for Ports<'_, G, S, J> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<G, S, J> Copy for Ports<'_, G, S, J> {}

/// The outcome of one job.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    /// Identifier of this job's run.
    pub run_id: RunId,
    /// Position in the plan.
    pub job_index: usize,
    /// Target chain length.
    pub narrative_length: usize,
    /// Position of the stub in the stubs file.
    pub stub_index: usize,
    /// The story stub.
    pub story_stub: String,
    /// Strategy label.
    pub strategy: String,
    /// Index of the MCTS configuration, for baseline jobs `None`.
    pub mcts_index: Option<usize>,
    /// Bullet list of the judged narrative.
    pub narrative: String,
    /// Mean judge score per dimension, in report column order.
    pub scores: [f64; DIMENSIONS],
    /// Mean of `scores`.
    pub avg_score: f64,
    /// Comments of the first judged narrative, or the error.
    pub judge_comments: String,
    /// Ranked paths of an MCTS tree.
    pub paths: Vec<PathRow>,
    /// Graphviz source of an MCTS tree.
    pub dot: Option<String>,
    /// Why the job failed.
    pub error: Option<String>,
}

impl ResultRow {
    fn failed(job: &Job, error: &SearchError) -> Self {
        Self {
            run_id: RunId::new(),
            job_index: job.index,
            narrative_length: job.narrative_length,
            stub_index: job.stub_index,
            story_stub: job.stub.clone(),
            strategy: job.strategy.label(),
            mcts_index: mcts_index(&job.strategy),
            narrative: NO_NARRATIVE.to_owned(),
            scores: [0.0; DIMENSIONS],
            avg_score: 0.0,
            judge_comments: format!("Error: {error}"),
            paths: Vec::new(),
            dot: None,
            error: Some(error.to_string()),
        }
    }

    /// Whether the job failed.
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

const fn mcts_index(strategy: &Strategy) -> Option<usize> {
    match strategy {
        Strategy::Mcts { index, .. } => Some(*index),
        Strategy::Multibranch { .. } => None,
    }
}

/// Run `job`, turning any failure into an error row.
pub async fn run_job<G, S, J>(
    ports: Ports<'_, G, S, J>,
    job: &Job,
    min_num_chains: usize,
    seed: Option<u64>,
) -> ResultRow
where
    G: ContinuationGenerator,
    S: ScalarScorer,
    J: StructuredJudge,
{
    let label = job.strategy.label();
    info!(job = job.index, stub = job.stub_index, strategy = %label, "job started");
    match execute(ports, job, min_num_chains, seed).await {
        Ok(row) => {
            info!(job = job.index, strategy = %label, avg_score = row.avg_score, "job finished");
            row
        }
        Err(e) => {
            warn!(job = job.index, strategy = %label, error = %e, "job failed");
            ResultRow::failed(job, &e)
        }
    }
}

async fn execute<G, S, J>(
    ports: Ports<'_, G, S, J>,
    job: &Job,
    min_num_chains: usize,
    seed: Option<u64>,
) -> Result<ResultRow, SearchError>
where
    G: ContinuationGenerator,
    S: ScalarScorer,
    J: StructuredJudge,
{
    let mut graph = EventGraph::new();
    let root = graph.create_node(job.stub.clone());

    let (narratives, paths, dot) = match &job.strategy {
        Strategy::Multibranch { branching_factor } => {
            let mut rng = job_rng(seed, job.index);
            let chain = generate_multibranch_chain(
                &mut graph,
                ports.generator,
                root,
                job.narrative_length,
                *branching_factor,
                &mut rng,
            )
            .await?;
            (vec![graph.render_bullets(&chain)?], Vec::new(), None)
        }
        Strategy::Mcts { config, .. } => {
            let config = config
                .clone()
                .with_early_stop(job.narrative_length, min_num_chains);
            let search = MctsSearch::new(config, ports.generator, ports.scorer)?;
            search.run(&mut graph, root).await?;
            (
                judged_narratives(&graph, root, min_num_chains)?,
                export_rows(&graph, root)?,
                Some(graph.to_dot()),
            )
        }
    };

    let mut verdicts = Vec::with_capacity(narratives.len());
    for narrative in &narratives {
        verdicts.push(ports.judge.score_structured(narrative).await);
    }
    let scores = mean_scores(&verdicts);

    Ok(ResultRow {
        run_id: RunId::new(),
        job_index: job.index,
        narrative_length: job.narrative_length,
        stub_index: job.stub_index,
        story_stub: job.stub.clone(),
        strategy: job.strategy.label(),
        mcts_index: mcts_index(&job.strategy),
        narrative: narratives.into_iter().next().unwrap_or_default(),
        avg_score: mean(&scores),
        scores,
        judge_comments: verdicts
            .into_iter()
            .next()
            .map(|v| v.narrative_comments)
            .unwrap_or_default(),
        paths,
        dot,
        error: None,
    })
}

/// Bullet lists of the top `k` paths, or of the root alone for a bare tree.
fn judged_narratives(
    graph: &EventGraph,
    root: EventId,
    k: usize,
) -> Result<Vec<String>, SearchError> {
    let top = top_k_paths(graph, root, k)?;
    if top.is_empty() {
        return Ok(vec![graph.render_bullets(&[root])?]);
    }
    top.iter()
        .map(|scored| graph.render_bullets(&scored.path).map_err(SearchError::from))
        .collect()
}

fn job_rng(seed: Option<u64>, index: usize) -> StdRng {
    match seed {
        Some(seed) => {
            let offset = u64::try_from(index).unwrap_or(u64::MAX);
            StdRng::seed_from_u64(seed.wrapping_add(offset))
        }
        None => StdRng::from_os_rng(),
    }
}

/// Dimension-wise mean of the verdicts; zeros when there are none.
pub fn mean_scores(verdicts: &[JudgeVerdict]) -> [f64; DIMENSIONS] {
    let mut sums = [0.0; DIMENSIONS];
    for verdict in verdicts {
        for (sum, value) in sums.iter_mut().zip(verdict.judgement.values()) {
            *sum += f64::from(value);
        }
    }
    if !verdicts.is_empty() {
        let count = count_as_f64(verdicts.len());
        for sum in &mut sums {
            *sum /= count;
        }
    }
    sums
}

/// Arithmetic mean; 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / count_as_f64(values.len())
}

#[allow(clippy::cast_precision_loss)]
const fn count_as_f64(n: usize) -> f64 {
    n as f64
}

/// Run every job with at most `max_workers` in flight.
///
/// Rows come back in plan order regardless of completion order.
pub async fn run_jobs<G, S, J>(
    ports: Ports<'_, G, S, J>,
    jobs: &[Job],
    config: &ExperimentConfig,
) -> Vec<ResultRow>
where
    G: ContinuationGenerator,
    S: ScalarScorer,
    J: StructuredJudge,
{
    let min_num_chains = config.min_num_chains;
    let seed = config.seed;
    let mut rows: Vec<ResultRow> = futures::stream::iter(jobs)
        .map(|job| run_job(ports, job, min_num_chains, seed))
        .buffer_unordered(config.max_workers.max(1))
        .collect()
        .await;
    rows.sort_by_key(|row| row.job_index);
    rows
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::float_cmp)]
mod tests {
    use plotweave_search::{
        ContinuationRequest, FixedScorer, GenerationError, NeutralJudge, ScriptedGenerator,
    };
    use plotweave_types::JudgeScores;

    use super::*;

    struct BrokenGenerator;

    impl ContinuationGenerator for BrokenGenerator {
        async fn generate_continuation(
            &self,
            _request: ContinuationRequest<'_>,
        ) -> Result<String, GenerationError> {
            Err(GenerationError::new("backend down"))
        }
    }

    fn stubs() -> Vec<String> {
        vec!["A lighthouse keeper finds a letter.".to_owned(), "Rain in the desert.".to_owned()]
    }

    fn small_config() -> ExperimentConfig {
        ExperimentConfig {
            narrative_lengths: vec![3],
            min_num_chains: 2,
            seed: Some(7),
            multibranch_factors: vec![2],
            mcts: vec![SearchConfig {
                max_children: 2,
                iterations: 20,
                ..SearchConfig::default()
            }],
            ..ExperimentConfig::default()
        }
    }

    #[test]
    fn stubs_skip_blank_lines() {
        let stubs = parse_stubs("  first  \n\n\t\nsecond\n");
        assert_eq!(stubs, vec!["first".to_owned(), "second".to_owned()]);
    }

    #[test]
    fn labels_match_report_format() {
        assert_eq!(
            Strategy::Multibranch { branching_factor: 3 }.label(),
            "baseline-multibranch (N=3)"
        );
        let mcts = Strategy::Mcts {
            index: 0,
            config: SearchConfig {
                max_children: 4,
                iterations: 50,
                scoring_depth: 2,
                ..SearchConfig::default()
            },
        };
        assert_eq!(mcts.label(), "mcts (max_children=4, iterations=50, scoring_depth=2)");
    }

    #[test]
    fn plan_covers_every_stub_and_strategy() {
        let jobs = plan_jobs(&stubs(), &small_config(), 3);
        assert_eq!(jobs.len(), 4);
        assert_eq!(jobs[0].stub_index, 0);
        assert!(matches!(jobs[0].strategy, Strategy::Multibranch { branching_factor: 2 }));
        assert!(matches!(jobs[1].strategy, Strategy::Mcts { index: 0, .. }));
        assert_eq!(jobs[3].stub_index, 1);
        assert!(jobs.iter().enumerate().all(|(i, job)| job.index == i));
    }

    #[test]
    fn mean_of_verdicts() {
        let verdicts = [
            JudgeVerdict {
                judgement: JudgeScores::uniform(8),
                narrative_comments: String::new(),
            },
            JudgeVerdict {
                judgement: JudgeScores::uniform(6),
                narrative_comments: String::new(),
            },
        ];
        let scores = mean_scores(&verdicts);
        assert!(scores.iter().all(|s| (s - 7.0).abs() < f64::EPSILON));
        assert!((mean(&scores) - 7.0).abs() < f64::EPSILON);
        assert_eq!(mean_scores(&[]), [0.0; DIMENSIONS]);
    }

    #[tokio::test]
    async fn stub_ports_produce_complete_rows() {
        let generator = ScriptedGenerator::numbered("Event {n}.");
        let scorer = FixedScorer::new(6.0);
        let judge = NeutralJudge;
        let ports = Ports {
            generator: &generator,
            scorer: &scorer,
            judge: &judge,
        };
        let config = small_config();
        let jobs = plan_jobs(&stubs(), &config, 3);

        let rows = run_jobs(ports, &jobs, &config).await;
        assert_eq!(rows.len(), 4);
        for (row, job) in rows.iter().zip(&jobs) {
            assert_eq!(row.job_index, job.index);
            assert!(!row.is_error());
            assert!(row.narrative.starts_with("- "));
            assert!(row.scores.iter().all(|s| (s - 5.0).abs() < f64::EPSILON));
            assert!((row.avg_score - 5.0).abs() < f64::EPSILON);
        }

        let baseline = &rows[0];
        assert_eq!(baseline.narrative.lines().count(), 3);
        assert!(baseline.paths.is_empty());
        assert!(baseline.dot.is_none());
        assert_eq!(baseline.mcts_index, None);

        let mcts = &rows[1];
        assert_eq!(mcts.mcts_index, Some(0));
        assert!(!mcts.paths.is_empty());
        assert_eq!(mcts.paths[0].rank, 1);
        assert!(mcts.dot.as_deref().unwrap().starts_with("digraph events {"));
    }

    #[tokio::test]
    async fn failures_become_error_rows() {
        let scorer = FixedScorer::new(6.0);
        let judge = NeutralJudge;
        let ports = Ports {
            generator: &BrokenGenerator,
            scorer: &scorer,
            judge: &judge,
        };
        let config = small_config();
        let jobs = plan_jobs(&stubs()[..1], &config, 3);

        let rows = run_jobs(ports, &jobs, &config).await;
        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert!(row.is_error());
            assert_eq!(row.narrative, NO_NARRATIVE);
            assert_eq!(row.scores, [0.0; DIMENSIONS]);
            assert!(row.judge_comments.starts_with("Error: "));
            assert!(row.judge_comments.contains("backend down"));
        }
    }

    #[tokio::test]
    async fn seeded_baselines_repeat() {
        let config = small_config();
        let jobs = plan_jobs(&stubs()[..1], &config, 4);
        let mut narratives = Vec::new();
        for _ in 0..2 {
            let generator = ScriptedGenerator::numbered("Event {n}.");
            let scorer = FixedScorer::new(6.0);
            let ports = Ports {
                generator: &generator,
                scorer: &scorer,
                judge: &NeutralJudge,
            };
            narratives.push(run_job(ports, &jobs[0], 2, config.seed).await.narrative);
        }
        assert_eq!(narratives[0], narratives[1]);
    }
}
