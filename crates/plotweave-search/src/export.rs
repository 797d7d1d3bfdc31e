//! Ranked path export.
//!
//! Rows are written as comma-separated text with the fixed header
//! `Rank,Path Score,Path (Node IDs),Path (Event Text)`. Fields containing a
//! comma, quote or line break are quoted and inner quotes doubled. Lines end
//! with CRLF.

use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use plotweave_graph::{EventGraph, GraphError};
use plotweave_types::EventId;
use serde::Serialize;

use crate::ranking::ranked_paths;

/// Column names, in output order.
pub const CSV_HEADER: [&str; 4] = ["Rank", "Path Score", "Path (Node IDs)", "Path (Event Text)"];

/// Separator used inside the id and text columns.
pub const PATH_SEPARATOR: &str = " -> ";

/// One exported path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathRow {
    /// 1-based rank.
    pub rank: usize,
    /// Path score.
    pub score: f64,
    /// Node ids, root first.
    pub node_ids: Vec<EventId>,
    /// Event texts joined by ` -> `.
    pub text: String,
}

impl PathRow {
    /// The score with three decimals.
    pub fn formatted_score(&self) -> String {
        format!("{:.3}", self.score)
    }

    /// Node ids joined by ` -> `.
    pub fn node_path(&self) -> String {
        self.node_ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(PATH_SEPARATOR)
    }
}

/// Every root-to-leaf path as a ranked row, best first.
///
/// # Errors
///
/// Returns [`GraphError::UnknownNode`] if `root` is not in the graph.
pub fn export_rows(graph: &EventGraph, root: EventId) -> Result<Vec<PathRow>, GraphError> {
    (1..)
        .zip(ranked_paths(graph, root)?)
        .map(|(rank, scored)| {
            Ok(PathRow {
                rank,
                score: scored.score,
                text: graph.render_arrow_text(&scored.path)?,
                node_ids: scored.path,
            })
        })
        .collect()
}

/// Write the header and `rows` to `writer`.
///
/// # Errors
///
/// Returns any I/O error from the writer.
pub fn write_csv<W: Write>(rows: &[PathRow], mut writer: W) -> io::Result<()> {
    writer.write_all(csv_line(&CSV_HEADER).as_bytes())?;
    for row in rows {
        let rank = row.rank.to_string();
        let score = row.formatted_score();
        let ids = row.node_path();
        writer.write_all(csv_line(&[&rank, &score, &ids, &row.text]).as_bytes())?;
    }
    writer.flush()
}

/// Write the header and `rows` to a new file at `path`.
///
/// # Errors
///
/// Returns any I/O error from creating or writing the file.
pub fn write_csv_file(rows: &[PathRow], path: &Path) -> io::Result<()> {
    write_csv(rows, BufWriter::new(File::create(path)?))
}

/// Join `fields` into one CRLF-terminated record, quoting where needed.
pub fn csv_line<S: AsRef<str>>(fields: &[S]) -> String {
    let mut line = fields
        .iter()
        .map(|f| csv_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    line.push_str("\r\n");
    line
}

/// Quote a single field if it contains a comma, quote or line break.
pub fn csv_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}
