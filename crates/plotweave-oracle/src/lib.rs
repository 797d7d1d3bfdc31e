//! LLM-backed ports for the Plotweave story search.
//!
//! [`LlmOracle`] implements the generation, scalar scoring and judge traits
//! from `plotweave-search` on top of an `OpenAI`-compatible or Anthropic HTTP
//! API. Configuration comes from the environment ([`OracleConfig`]).
//!
//! # Modules
//!
//! - [`config`] -- Environment-driven backend, model and retry settings
//! - [`error`] -- [`OracleError`] and its conversion to `GenerationError`
//! - [`llm`] -- HTTP backends with enum dispatch
//! - [`retry`] -- Jittered exponential backoff around retriable failures
//! - [`prompt`] -- `minijinja` templates with on-disk overrides
//! - [`parse`] -- Score and verdict extraction with neutral fallbacks
//! - [`oracle`] -- The port implementations

pub mod config;
pub mod error;
pub mod llm;
pub mod oracle;
pub mod parse;
pub mod prompt;
pub mod retry;

pub use config::{BackendType, ModelSettings, OracleConfig};
pub use error::OracleError;
pub use llm::{CompletionRequest, LlmBackend, create_backend};
pub use oracle::{LlmOracle, judge_schema};
pub use prompt::PromptEngine;
pub use retry::{RetryPolicy, with_retry};
