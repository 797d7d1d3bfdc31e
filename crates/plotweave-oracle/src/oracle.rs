//! The LLM-backed implementation of the search ports.
//!
//! [`LlmOracle`] renders a prompt, sends it through the configured backend
//! under the retry policy, and interprets the reply. Generation errors reach
//! the caller as [`GenerationError`]; scoring and judging absorb every
//! failure into their neutral fallbacks and log a warning.

use plotweave_search::{
    ContinuationGenerator, ContinuationRequest, GenerationError, ScalarScorer, StructuredJudge,
    ports::NEUTRAL_SCORE,
};
use plotweave_types::{DIMENSION_NAMES, JudgeVerdict, MAX_DIMENSION_SCORE, MIN_DIMENSION_SCORE};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::config::{ModelSettings, OracleConfig};
use crate::error::OracleError;
use crate::llm::{CompletionRequest, LlmBackend, create_backend};
use crate::parse::{parse_judge_verdict, score_or_neutral};
use crate::prompt::PromptEngine;
use crate::retry::{RetryPolicy, with_retry};

/// Generation, scoring and judging over one HTTP backend.
#[derive(Debug)]
pub struct LlmOracle {
    backend: LlmBackend,
    prompts: PromptEngine,
    retry: RetryPolicy,
    generation: ModelSettings,
    scoring: ModelSettings,
    judge: ModelSettings,
    judge_schema: Value,
}

impl LlmOracle {
    /// Build an oracle from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Config`] for the stub backend or an unusable
    /// HTTP client, and [`OracleError::Template`] if a prompt override is
    /// broken.
    pub fn from_config(config: &OracleConfig) -> Result<Self, OracleError> {
        let backend = create_backend(config)?;
        let prompts = PromptEngine::with_overrides(config.prompts_dir.as_deref())?;
        Ok(Self::new(backend, prompts, config))
    }

    /// Assemble an oracle from parts.
    pub fn new(backend: LlmBackend, prompts: PromptEngine, config: &OracleConfig) -> Self {
        Self {
            backend,
            prompts,
            retry: config.retry,
            generation: config.generation.clone(),
            scoring: config.scoring.clone(),
            judge: config.judge.clone(),
            judge_schema: judge_schema(),
        }
    }

    /// Name of the backend in use.
    pub const fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    async fn complete(
        &self,
        label: &str,
        prompt: &str,
        settings: &ModelSettings,
        json_schema: Option<&Value>,
    ) -> Result<String, OracleError> {
        let request = CompletionRequest {
            prompt,
            settings,
            json_schema,
        };
        with_retry(&self.retry, label, || self.backend.complete(&request)).await
    }

    async fn try_score(&self, document: &str, constraints: Option<&str>) -> Result<f64, OracleError> {
        let prompt = self.prompts.render_score(document, constraints)?;
        let reply = self.complete("score", &prompt, &self.scoring, None).await?;
        let score = score_or_neutral(&reply);
        debug!(score, raw_response = %reply, "scored");
        Ok(score)
    }

    async fn try_judge(&self, document: &str) -> Result<JudgeVerdict, OracleError> {
        let prompt = self.prompts.render_judge(document)?;
        let reply = self
            .complete("judge", &prompt, &self.judge, Some(&self.judge_schema))
            .await?;
        Ok(parse_judge_verdict(&reply))
    }
}

impl ContinuationGenerator for LlmOracle {
    async fn generate_continuation(
        &self,
        request: ContinuationRequest<'_>,
    ) -> Result<String, GenerationError> {
        let prompt = self.prompts.render_next_event(&request)?;
        let text = self
            .complete("generate", &prompt, &self.generation, None)
            .await?;
        debug!(
            context_len = request.context.len(),
            prior_attempts = request.prior_attempts.len(),
            text = %text,
            "generated continuation"
        );
        Ok(text)
    }
}

impl ScalarScorer for LlmOracle {
    async fn score_scalar(&self, document: &str, constraints: Option<&str>) -> f64 {
        match self.try_score(document, constraints).await {
            Ok(score) => score,
            Err(e) => {
                warn!(error = %e, "scoring failed, using neutral score");
                NEUTRAL_SCORE
            }
        }
    }
}

impl StructuredJudge for LlmOracle {
    async fn score_structured(&self, document: &str) -> JudgeVerdict {
        match self.try_judge(document).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(error = %e, "judge call failed, using neutral verdict");
                JudgeVerdict::fallback(format!("Error calling LLM: {e}"))
            }
        }
    }
}

/// Structured-output schema for the judge reply.
pub fn judge_schema() -> Value {
    let dimension = json!({
        "type": "integer",
        "minimum": MIN_DIMENSION_SCORE,
        "maximum": MAX_DIMENSION_SCORE,
    });
    let properties: Map<String, Value> = DIMENSION_NAMES
        .iter()
        .map(|name| ((*name).to_owned(), dimension.clone()))
        .collect();
    json!({
        "name": "NarrativeJudge",
        "strict": true,
        "schema": {
            "type": "object",
            "properties": {
                "judgement": {
                    "type": "object",
                    "properties": properties,
                    "required": DIMENSION_NAMES,
                    "additionalProperties": false,
                },
                "narrative_comments": {"type": "string"},
            },
            "required": ["judgement", "narrative_comments"],
            "additionalProperties": false,
        },
    })
}
