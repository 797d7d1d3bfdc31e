//! Report files for one narrative length.
//!
//! Each length gets its own folder under the output directory holding:
//!
//! - `all_results.csv` -- one row per job
//! - `aggregate_scores.csv` -- per-strategy means over successful jobs
//! - `paths/stub-NNN-mcts-K.csv` -- every ranked path of each MCTS tree
//! - `paths/stub-NNN-mcts-K.dot` -- Graphviz source of the same tree
//! - `run_summary.json` -- timestamps, counts and run ids

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use plotweave_search::{csv_line, write_csv_file};
use plotweave_types::{DIMENSION_NAMES, RunId};
use serde::Serialize;
use tracing::info;

use crate::error::HarnessError;
use crate::harness::{DIMENSIONS, ResultRow, mean};

/// Per-job results file.
pub const ALL_RESULTS_FILE: &str = "all_results.csv";

/// Per-strategy means file.
pub const AGGREGATE_FILE: &str = "aggregate_scores.csv";

/// Run summary file.
pub const SUMMARY_FILE: &str = "run_summary.json";

/// Folder of per-tree path exports.
pub const PATHS_DIR: &str = "paths";

/// Mean scores of one strategy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyAggregate {
    /// Strategy label.
    pub strategy: String,
    /// Jobs that ran, failures included.
    pub runs: usize,
    /// Jobs that failed.
    pub failed: usize,
    /// Mean per dimension over successful jobs.
    pub scores: [f64; DIMENSIONS],
    /// Mean of `scores`.
    pub avg_score: f64,
}

/// One job as listed in the summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    /// The job's run id.
    pub run_id: RunId,
    /// Position of the stub in the stubs file.
    pub stub_index: usize,
    /// Strategy label.
    pub strategy: String,
    /// Average judge score.
    pub avg_score: f64,
    /// Failure message, if any.
    pub error: Option<String>,
}

/// Contents of `run_summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Target chain length.
    pub narrative_length: usize,
    /// When the first job started.
    pub started_at: DateTime<Utc>,
    /// When the reports were written.
    pub finished_at: DateTime<Utc>,
    /// Jobs run.
    pub jobs: usize,
    /// Jobs that failed.
    pub failed: usize,
    /// Per-strategy means.
    pub strategies: Vec<StrategyAggregate>,
    /// Every job.
    pub runs: Vec<RunRecord>,
}

/// Means per strategy, in order of first appearance.
///
/// Failed jobs are counted but do not contribute scores. A strategy whose
/// jobs all failed reports zeros.
pub fn aggregate(rows: &[ResultRow]) -> Vec<StrategyAggregate> {
    let mut groups: Vec<(&str, Vec<&ResultRow>)> = Vec::new();
    for row in rows {
        let label = row.strategy.as_str();
        match groups.iter_mut().find(|group| group.0 == label) {
            Some(group) => group.1.push(row),
            None => groups.push((label, vec![row])),
        }
    }

    groups
        .into_iter()
        .map(|(label, members)| {
            let ok: Vec<&ResultRow> = members.iter().copied().filter(|r| !r.is_error()).collect();
            let mut scores = [0.0; DIMENSIONS];
            for (dim, score) in scores.iter_mut().enumerate() {
                let values: Vec<f64> = ok
                    .iter()
                    .filter_map(|row| row.scores.get(dim).copied())
                    .collect();
                *score = mean(&values);
            }
            StrategyAggregate {
                strategy: label.to_owned(),
                runs: members.len(),
                failed: members.len().saturating_sub(ok.len()),
                avg_score: mean(&scores),
                scores,
            }
        })
        .collect()
}

fn format_score(score: f64) -> String {
    format!("{score:.3}")
}

/// `all_results.csv` contents.
pub fn all_results_csv(rows: &[ResultRow]) -> String {
    let mut header = vec!["strategy", "story_stub", "narrative"];
    header.extend(DIMENSION_NAMES);
    header.extend(["avg_score", "judge_comments"]);

    let mut out = csv_line(&header);
    for row in rows {
        let mut fields = vec![row.strategy.clone(), row.story_stub.clone(), row.narrative.clone()];
        fields.extend(row.scores.iter().copied().map(format_score));
        fields.push(format_score(row.avg_score));
        fields.push(row.judge_comments.clone());
        out.push_str(&csv_line(&fields));
    }
    out
}

/// `aggregate_scores.csv` contents.
pub fn aggregate_csv(aggregates: &[StrategyAggregate]) -> String {
    let mut header = vec!["strategy"];
    header.extend(DIMENSION_NAMES);
    header.push("avg_score");

    let mut out = csv_line(&header);
    for agg in aggregates {
        let mut fields = vec![agg.strategy.clone()];
        fields.extend(agg.scores.iter().copied().map(format_score));
        fields.push(format_score(agg.avg_score));
        out.push_str(&csv_line(&fields));
    }
    out
}

/// File name of the path export for an MCTS row.
pub fn paths_file_name(stub_index: usize, mcts_index: usize) -> String {
    format!("stub-{stub_index:03}-mcts-{mcts_index}.csv")
}

/// File name of the tree rendering for an MCTS row.
pub fn dot_file_name(stub_index: usize, mcts_index: usize) -> String {
    format!("stub-{stub_index:03}-mcts-{mcts_index}.dot")
}

/// Write every report for one narrative length into `dir`.
///
/// # Errors
///
/// Returns [`HarnessError::Io`] if a file or folder cannot be written and
/// [`HarnessError::Serde`] if the summary cannot be serialized.
pub fn write_reports(
    dir: &Path,
    narrative_length: usize,
    rows: &[ResultRow],
    started_at: DateTime<Utc>,
) -> Result<RunSummary, HarnessError> {
    std::fs::create_dir_all(dir).map_err(|e| HarnessError::io(dir, e))?;

    write_file(&dir.join(ALL_RESULTS_FILE), &all_results_csv(rows))?;
    let strategies = aggregate(rows);
    write_file(&dir.join(AGGREGATE_FILE), &aggregate_csv(&strategies))?;

    let paths_dir = dir.join(PATHS_DIR);
    for row in rows.iter().filter(|row| !row.paths.is_empty() || row.dot.is_some()) {
        let Some(mcts_index) = row.mcts_index else {
            continue;
        };
        std::fs::create_dir_all(&paths_dir).map_err(|e| HarnessError::io(&paths_dir, e))?;
        if !row.paths.is_empty() {
            let path = paths_dir.join(paths_file_name(row.stub_index, mcts_index));
            write_csv_file(&row.paths, &path).map_err(|e| HarnessError::io(&path, e))?;
        }
        if let Some(dot) = &row.dot {
            write_file(&paths_dir.join(dot_file_name(row.stub_index, mcts_index)), dot)?;
        }
    }

    let summary = RunSummary {
        narrative_length,
        started_at,
        finished_at: Utc::now(),
        jobs: rows.len(),
        failed: rows.iter().filter(|row| row.is_error()).count(),
        strategies,
        runs: rows
            .iter()
            .map(|row| RunRecord {
                run_id: row.run_id,
                stub_index: row.stub_index,
                strategy: row.strategy.clone(),
                avg_score: row.avg_score,
                error: row.error.clone(),
            })
            .collect(),
    };
    let json = serde_json::to_string_pretty(&summary)?;
    write_file(&dir.join(SUMMARY_FILE), &json)?;

    info!(
        dir = %dir.display(),
        jobs = summary.jobs,
        failed = summary.failed,
        "reports written"
    );
    Ok(summary)
}

/// Folder for one narrative length under `output_dir`.
pub fn length_dir(output_dir: &Path, narrative_length: usize) -> PathBuf {
    output_dir.join(narrative_length.to_string())
}

fn write_file(path: &Path, contents: &str) -> Result<(), HarnessError> {
    std::fs::write(path, contents).map_err(|e| HarnessError::io(path, e))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::float_cmp)]
mod tests {
    use plotweave_search::PathRow;
    use plotweave_types::EventId;

    use super::*;

    fn row(strategy: &str, score: f64, error: Option<&str>) -> ResultRow {
        ResultRow {
            run_id: RunId::new(),
            job_index: 0,
            narrative_length: 3,
            stub_index: 0,
            story_stub: "A stub".to_owned(),
            strategy: strategy.to_owned(),
            mcts_index: None,
            narrative: "- A stub\n- Next".to_owned(),
            scores: [score; DIMENSIONS],
            avg_score: score,
            judge_comments: "Fine, mostly.".to_owned(),
            paths: Vec::new(),
            dot: None,
            error: error.map(str::to_owned),
        }
    }

    #[test]
    fn aggregate_skips_failed_rows() {
        let rows = [
            row("a", 6.0, None),
            row("b", 9.0, None),
            row("a", 8.0, None),
            row("a", 0.0, Some("boom")),
        ];
        let aggs = aggregate(&rows);
        assert_eq!(aggs.len(), 2);
        assert_eq!(aggs[0].strategy, "a");
        assert_eq!(aggs[0].runs, 3);
        assert_eq!(aggs[0].failed, 1);
        assert!((aggs[0].avg_score - 7.0).abs() < 1e-9);
        assert!((aggs[1].scores[3] - 9.0).abs() < 1e-9);
    }

    #[test]
    fn all_failed_strategy_reports_zero() {
        let aggs = aggregate(&[row("a", 0.0, Some("boom"))]);
        assert_eq!(aggs[0].scores, [0.0; DIMENSIONS]);
        assert_eq!(aggs[0].failed, 1);
    }

    #[test]
    fn results_csv_quotes_multiline_narratives() {
        let csv = all_results_csv(&[row("baseline-multibranch (N=3)", 7.0, None)]);
        let mut lines = csv.split("\r\n");
        assert_eq!(
            lines.next().unwrap(),
            "strategy,story_stub,narrative,overall_quality,identifying_major_flaws,\
             character_behavior,common_sense_adherence,consistency,relatedness,\
             causal_temporal_relationship,avg_score,judge_comments"
        );
        assert!(csv.contains("\"- A stub\n- Next\""));
        assert!(csv.contains("7.000,\"Fine, mostly.\"\r\n"));
    }

    #[test]
    fn aggregate_csv_header() {
        let csv = aggregate_csv(&aggregate(&[row("a", 5.0, None)]));
        assert!(csv.starts_with("strategy,overall_quality,"));
        assert!(csv.ends_with("a,5.000,5.000,5.000,5.000,5.000,5.000,5.000,5.000\r\n"));
    }

    #[test]
    fn writes_every_report() {
        let dir = std::env::temp_dir().join(format!("plotweave-report-{}", std::process::id()));
        let mut mcts = row("mcts (max_children=2, iterations=5, scoring_depth=1)", 6.0, None);
        mcts.stub_index = 4;
        mcts.mcts_index = Some(1);
        mcts.paths = vec![PathRow {
            rank: 1,
            score: 6.0,
            node_ids: vec![EventId(1), EventId(2)],
            text: "A stub -> Next".to_owned(),
        }];
        mcts.dot = Some("digraph events {\n  1 -> 2;\n}\n".to_owned());
        let rows = [row("baseline-multibranch (N=3)", 7.0, None), mcts];

        let out = length_dir(&dir, 3);
        let summary = write_reports(&out, 3, &rows, Utc::now()).unwrap();
        assert_eq!(summary.jobs, 2);
        assert_eq!(summary.strategies.len(), 2);

        assert!(out.join(ALL_RESULTS_FILE).is_file());
        assert!(out.join(AGGREGATE_FILE).is_file());
        let paths = std::fs::read_to_string(out.join(PATHS_DIR).join("stub-004-mcts-1.csv")).unwrap();
        assert!(paths.contains("1,6.000,1 -> 2,A stub -> Next"));
        let dot = std::fs::read_to_string(out.join(PATHS_DIR).join("stub-004-mcts-1.dot")).unwrap();
        assert!(dot.starts_with("digraph events {"));
        assert!(!out.join(PATHS_DIR).join("stub-000-mcts-0.dot").exists());
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.join(SUMMARY_FILE)).unwrap()).unwrap();
        assert_eq!(json["narrative_length"], 3);
        assert_eq!(json["runs"].as_array().unwrap().len(), 2);

        std::fs::remove_dir_all(&dir).ok();
    }
}
