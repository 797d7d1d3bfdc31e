//! Oracle configuration.
//!
//! All settings come from environment variables. [`OracleConfig::from_lookup`]
//! takes the lookup as a function so tests can supply a map instead of the
//! process environment.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::OracleError;
use crate::retry::RetryPolicy;

/// Default `OpenAI`-compatible API base URL.
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Default Anthropic API base URL.
pub const DEFAULT_ANTHROPIC_URL: &str = "https://api.anthropic.com/v1";

/// Complete oracle configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleConfig {
    /// Which backend serves the requests.
    pub backend: BackendType,
    /// Base API URL (e.g. `https://api.openai.com/v1`).
    pub api_url: String,
    /// API key for authentication. Empty for the stub backend.
    pub api_key: String,
    /// Model settings for next-event generation.
    pub generation: ModelSettings,
    /// Model settings for scalar scoring.
    pub scoring: ModelSettings,
    /// Model settings for the structured judge.
    pub judge: ModelSettings,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// Retry policy for retriable failures.
    pub retry: RetryPolicy,
    /// Directory with prompt template overrides.
    pub prompts_dir: Option<PathBuf>,
}

/// Model, sampling temperature and output cap for one kind of request.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    /// Model identifier.
    pub model: String,
    /// Sampling temperature; omitted from the request when `None`.
    pub temperature: Option<f64>,
    /// Output token cap; omitted from the request when `None`.
    pub max_output_tokens: Option<u32>,
}

/// Supported backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// `OpenAI`-compatible chat completions API.
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
    /// Offline deterministic stubs; no HTTP at all.
    Stub,
}

impl FromStr for BackendType {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "deepseek" | "ollama" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "stub" => Ok(Self::Stub),
            other => Err(OracleError::Config(format!("unknown backend type: {other}"))),
        }
    }
}

impl OracleConfig {
    /// Load configuration from the process environment.
    ///
    /// See [`from_lookup`](Self::from_lookup) for the variables read.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Config`] for missing or unparsable values.
    pub fn from_env() -> Result<Self, OracleError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`.
    ///
    /// Variables (all optional unless noted):
    /// - `LLM_BACKEND` -- `openai`, `anthropic` or `stub` (default `openai`)
    /// - `LLM_API_URL` -- API base URL (default depends on the backend)
    /// - `LLM_API_KEY` -- required unless the backend is `stub`
    /// - `GENERATION_MODEL`, `GENERATION_TEMPERATURE`, `GENERATION_MAX_TOKENS`
    ///   (default `gpt-4`, 0.8, 300)
    /// - `SCORING_MODEL`, `SCORING_TEMPERATURE` (default `gpt-3.5-turbo`, 0.0)
    /// - `JUDGE_MODEL`, `JUDGE_TEMPERATURE` (default `gpt-4o`, unset)
    /// - `REQUEST_TIMEOUT_SECS` (default 300)
    /// - `RETRY_MAX_ATTEMPTS` (default 6)
    /// - `RETRY_MIN_BACKOFF_MS`, `RETRY_MAX_BACKOFF_MS` (default 1000, 60000)
    /// - `PROMPTS_DIR` -- directory with `next_event.j2`, `score.j2`,
    ///   `judge.j2` overrides
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Config`] for missing or unparsable values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, OracleError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = parse_or(&lookup, "LLM_BACKEND", BackendType::OpenAi)?;
        let api_url = lookup("LLM_API_URL").unwrap_or_else(|| {
            match backend {
                BackendType::Anthropic => DEFAULT_ANTHROPIC_URL,
                BackendType::OpenAi | BackendType::Stub => DEFAULT_OPENAI_URL,
            }
            .to_owned()
        });
        let api_key = match backend {
            BackendType::Stub => lookup("LLM_API_KEY").unwrap_or_default(),
            BackendType::OpenAi | BackendType::Anthropic => lookup("LLM_API_KEY")
                .filter(|key| !key.is_empty())
                .ok_or_else(|| OracleError::Config("missing required env var LLM_API_KEY".to_owned()))?,
        };

        let generation = ModelSettings {
            model: lookup("GENERATION_MODEL").unwrap_or_else(|| "gpt-4".to_owned()),
            temperature: Some(parse_or(&lookup, "GENERATION_TEMPERATURE", 0.8)?),
            max_output_tokens: Some(parse_or(&lookup, "GENERATION_MAX_TOKENS", 300)?),
        };
        let scoring = ModelSettings {
            model: lookup("SCORING_MODEL").unwrap_or_else(|| "gpt-3.5-turbo".to_owned()),
            temperature: Some(parse_or(&lookup, "SCORING_TEMPERATURE", 0.0)?),
            max_output_tokens: None,
        };
        let judge = ModelSettings {
            model: lookup("JUDGE_MODEL").unwrap_or_else(|| "gpt-4o".to_owned()),
            temperature: parse_optional(&lookup, "JUDGE_TEMPERATURE")?,
            max_output_tokens: None,
        };

        let request_timeout = Duration::from_secs(parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 300)?);
        let retry = RetryPolicy {
            max_attempts: parse_or(&lookup, "RETRY_MAX_ATTEMPTS", 6)?,
            min_backoff: Duration::from_millis(parse_or(&lookup, "RETRY_MIN_BACKOFF_MS", 1000)?),
            max_backoff: Duration::from_millis(parse_or(&lookup, "RETRY_MAX_BACKOFF_MS", 60_000)?),
        };
        retry.validate()?;

        Ok(Self {
            backend,
            api_url: api_url.trim_end_matches('/').to_owned(),
            api_key,
            generation,
            scoring,
            judge,
            request_timeout,
            retry,
            prompts_dir: lookup("PROMPTS_DIR").map(PathBuf::from),
        })
    }

    /// Load configuration from a fixed map of variables.
    ///
    /// # Errors
    ///
    /// Same as [`from_lookup`](Self::from_lookup).
    pub fn from_map(vars: &BTreeMap<String, String>) -> Result<Self, OracleError> {
        Self::from_lookup(|name| vars.get(name).cloned())
    }
}

/// Parse a variable, falling back to `default` when it is unset.
fn parse_or<T, F>(lookup: &F, name: &str, default: T) -> Result<T, OracleError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    parse_optional(lookup, name).map(|value| value.unwrap_or(default))
}

/// Parse a variable that may be unset.
fn parse_optional<T, F>(lookup: &F, name: &str) -> Result<Option<T>, OracleError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| OracleError::Config(format!("invalid {name}: {e}")))
        })
        .transpose()
}
