//! Error types for the evaluation harness.

use std::path::PathBuf;

use crate::config::ConfigError;

/// Errors that stop a harness run.
///
/// Failures inside a single job never surface here; they become error rows
/// in the report instead.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// The experiment configuration could not be loaded.
    #[error("config error: {source}")]
    Config {
        /// The underlying configuration error.
        #[from]
        source: ConfigError,
    },

    /// The LLM oracle could not be configured.
    #[error("oracle error: {source}")]
    Oracle {
        /// The underlying oracle error.
        #[from]
        source: plotweave_oracle::OracleError,
    },

    /// Reading or writing a file failed.
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The run summary could not be serialized.
    #[error("serialization error: {source}")]
    Serde {
        /// The underlying serialization error.
        #[from]
        source: serde_json::Error,
    },

    /// The stubs file holds no story stubs.
    #[error("no story stubs found in {}", path.display())]
    NoStubs {
        /// The stubs file that was read.
        path: PathBuf,
    },
}

impl HarnessError {
    /// Attach `path` to an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
