//! Error types for the LLM oracle.
//!
//! [`OracleError`] never leaves this crate's port implementations as-is:
//! generation converts it to a [`GenerationError`], scoring and judging
//! absorb it into their neutral fallbacks.

use plotweave_search::GenerationError;

/// Errors raised while talking to an LLM backend.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// The backend answered with a non-success HTTP status.
    #[error("{backend} returned {status}: {body}")]
    Status {
        /// Backend name for logging.
        backend: &'static str,
        /// The HTTP status code.
        status: u16,
        /// The response body, or a placeholder if it could not be read.
        body: String,
    },

    /// The request never produced a response.
    #[error("{backend} request failed: {message}")]
    Transport {
        /// Backend name for logging.
        backend: &'static str,
        /// Description of the failure.
        message: String,
        /// Whether the failure was a connect error or a timeout.
        retriable: bool,
    },

    /// The response arrived but did not have the expected shape.
    #[error("malformed {backend} response: {message}")]
    MalformedResponse {
        /// Backend name for logging.
        backend: &'static str,
        /// What was missing or unreadable.
        message: String,
    },

    /// Failed to load or render a prompt template.
    #[error("template error: {0}")]
    Template(String),

    /// Configuration is invalid or missing.
    #[error("config error: {0}")]
    Config(String),

    /// Serialization or deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl OracleError {
    /// Whether retrying the same request may succeed.
    ///
    /// True for HTTP 429, any 5xx status, connect errors and timeouts.
    pub const fn is_retriable(&self) -> bool {
        match self {
            Self::Status { status, .. } => matches!(*status, 429 | 500..=599),
            Self::Transport { retriable, .. } => *retriable,
            Self::MalformedResponse { .. }
            | Self::Template(_)
            | Self::Config(_)
            | Self::Serde(_) => false,
        }
    }

    pub(crate) fn transport(backend: &'static str, error: &reqwest::Error) -> Self {
        Self::Transport {
            backend,
            message: error.to_string(),
            retriable: error.is_connect() || error.is_timeout(),
        }
    }
}

impl From<OracleError> for GenerationError {
    fn from(error: OracleError) -> Self {
        Self::new(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> OracleError {
        OracleError::Status {
            backend: "openai-compatible",
            status: code,
            body: String::new(),
        }
    }

    #[test]
    fn rate_limits_and_server_errors_retry() {
        assert!(status(429).is_retriable());
        assert!(status(500).is_retriable());
        assert!(status(503).is_retriable());
        assert!(!status(400).is_retriable());
        assert!(!status(401).is_retriable());
    }

    #[test]
    fn transport_flag_is_respected() {
        let timeout = OracleError::Transport {
            backend: "anthropic",
            message: "timed out".to_owned(),
            retriable: true,
        };
        assert!(timeout.is_retriable());
        assert!(!OracleError::Config("x".to_owned()).is_retriable());
    }

    #[test]
    fn converts_to_generation_error() {
        let err: GenerationError = status(401).into();
        assert!(err.message.contains("401"));
    }
}
