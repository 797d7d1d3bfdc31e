//! Text renderings of chains and of the whole graph.

use plotweave_types::EventId;

use crate::GraphError;
use crate::graph::EventGraph;

impl EventGraph {
    /// One `- text` line per event, joined with newlines.
    ///
    /// This is the form chains take when handed to the scorer and judge.
    pub fn render_bullets(&self, path: &[EventId]) -> Result<String, GraphError> {
        Ok(bullet_list(&self.texts(path)?))
    }

    /// Event texts joined by ` -> `.
    pub fn render_arrow_text(&self, path: &[EventId]) -> Result<String, GraphError> {
        Ok(self.texts(path)?.join(" -> "))
    }

    /// Graphviz DOT source, laid out left to right with labelled edges.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph events {\n");
        out.push_str("  rankdir=LR;\n");
        out.push_str("  node [shape=box, style=filled, fillcolor=lightblue, fontsize=8];\n");
        for node in self.nodes() {
            out.push_str(&format!(
                "  {} [label=\"{}\"];\n",
                node.id(),
                escape_dot(node.text())
            ));
        }
        for node in self.nodes() {
            for edge in self.edges_from(node.id()).unwrap_or_default() {
                out.push_str(&format!(
                    "  {} -> {} [label=\"{}\", fontcolor=red];\n",
                    node.id(),
                    edge.target,
                    escape_dot(&edge.label)
                ));
            }
        }
        out.push_str("}\n");
        out
    }
}

/// Render texts as `- text` lines.
pub fn bullet_list<S: AsRef<str>>(texts: &[S]) -> String {
    texts
        .iter()
        .map(|t| format!("- {}", t.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn escape_dot(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
