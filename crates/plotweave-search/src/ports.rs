//! Generation and scoring ports.
//!
//! The search engine never talks to a model directly. It asks a
//! [`ContinuationGenerator`] for the next event and a [`ScalarScorer`] for a
//! 1-10 quality score; the harness additionally asks a [`StructuredJudge`]
//! for a seven-dimension verdict on finished narratives.
//!
//! Scoring ports are infallible by contract: an adapter that cannot obtain
//! or parse a score returns the neutral value instead. Generation is the only
//! port whose failure reaches the caller.
//!
//! The stubs at the bottom of this module ([`ScriptedGenerator`],
//! [`FixedScorer`], [`NeutralJudge`]) are deterministic and record what they
//! were asked, which is what the tests and the harness dry-run mode need.

use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use plotweave_types::JudgeVerdict;

/// Score returned whenever a real one cannot be obtained.
pub const NEUTRAL_SCORE: f64 = 5.0;

/// Lowest valid scalar score.
pub const MIN_SCORE: f64 = 1.0;

/// Highest valid scalar score.
pub const MAX_SCORE: f64 = 10.0;

/// What the generator is asked to continue.
#[derive(Debug, Clone, Copy)]
pub struct ContinuationRequest<'a> {
    /// Event texts in chronological order.
    pub context: &'a [String],
    /// Earlier continuations of the same context the new one must differ from.
    pub prior_attempts: &'a [String],
    /// Optional extra instructions.
    pub extra_context: Option<&'a str>,
}

impl<'a> ContinuationRequest<'a> {
    /// A request with no prior attempts and no extra instructions.
    pub const fn new(context: &'a [String]) -> Self {
        Self {
            context,
            prior_attempts: &[],
            extra_context: None,
        }
    }
}

/// The generation port could not produce a continuation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("generation failed: {message}")]
pub struct GenerationError {
    /// Description of the failure.
    pub message: String,
}

impl GenerationError {
    /// Wrap a failure description.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Produces the next event of a story.
pub trait ContinuationGenerator: Sync {
    /// Generate one continuation of `request.context`.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError`] if no text could be obtained. The search
    /// treats this as fatal to the current run.
    fn generate_continuation(
        &self,
        request: ContinuationRequest<'_>,
    ) -> impl Future<Output = Result<String, GenerationError>> + Send;
}

/// Rates a bullet-list document on a 1-10 scale.
pub trait ScalarScorer: Sync {
    /// Score `document`, optionally under extra `constraints`.
    ///
    /// Never fails; anomalies yield [`NEUTRAL_SCORE`].
    fn score_scalar(
        &self,
        document: &str,
        constraints: Option<&str>,
    ) -> impl Future<Output = f64> + Send;
}

/// Produces a seven-dimension verdict on a finished narrative.
pub trait StructuredJudge: Sync {
    /// Judge `document`.
    ///
    /// Never fails; anomalies yield [`JudgeVerdict::fallback`].
    fn score_structured(&self, document: &str) -> impl Future<Output = JudgeVerdict> + Send;
}

/// A generator request captured by [`ScriptedGenerator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// The context texts.
    pub context: Vec<String>,
    /// The prior attempts.
    pub prior_attempts: Vec<String>,
    /// The extra instructions, if any.
    pub extra_context: Option<String>,
}

/// Deterministic generator for tests and dry runs.
///
/// Every call returns the template with `{n}` replaced by the 1-based call
/// number, so `"event-{n}"` yields `event-1`, `event-2`, ...
#[derive(Debug)]
pub struct ScriptedGenerator {
    template: String,
    calls: AtomicU64,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedGenerator {
    /// Create a generator from a `{n}` template.
    pub fn numbered(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            calls: AtomicU64::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of calls served so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl ContinuationGenerator for ScriptedGenerator {
    async fn generate_continuation(
        &self,
        request: ContinuationRequest<'_>,
    ) -> Result<String, GenerationError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        if let Ok(mut guard) = self.requests.lock() {
            guard.push(RecordedRequest {
                context: request.context.to_vec(),
                prior_attempts: request.prior_attempts.to_vec(),
                extra_context: request.extra_context.map(str::to_owned),
            });
        }
        Ok(self.template.replace("{n}", &n.to_string()))
    }
}

/// Scorer that always returns the same value and records each document.
#[derive(Debug)]
pub struct FixedScorer {
    score: f64,
    documents: Mutex<Vec<String>>,
}

impl FixedScorer {
    /// Create a scorer that always answers `score`.
    pub const fn new(score: f64) -> Self {
        Self {
            score,
            documents: Mutex::new(Vec::new()),
        }
    }

    /// Every document scored so far, in order.
    pub fn documents(&self) -> Vec<String> {
        self.documents
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl ScalarScorer for FixedScorer {
    async fn score_scalar(&self, document: &str, _constraints: Option<&str>) -> f64 {
        if let Ok(mut guard) = self.documents.lock() {
            guard.push(document.to_owned());
        }
        self.score
    }
}

/// Judge that scores every dimension 5.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralJudge;

impl StructuredJudge for NeutralJudge {
    async fn score_structured(&self, _document: &str) -> JudgeVerdict {
        JudgeVerdict::fallback("stub judge")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_generator_numbers_calls() {
        let generator = ScriptedGenerator::numbered("event-{n}");
        let context = vec!["root".to_owned()];
        let first = generator
            .generate_continuation(ContinuationRequest::new(&context))
            .await
            .unwrap();
        let second = generator
            .generate_continuation(ContinuationRequest::new(&context))
            .await
            .unwrap();
        assert_eq!(first, "event-1");
        assert_eq!(second, "event-2");
        assert_eq!(generator.calls(), 2);
        assert_eq!(generator.requests().len(), 2);
        assert_eq!(generator.requests()[0].context, context);
    }

    #[tokio::test]
    async fn fixed_scorer_records_documents() {
        let scorer = FixedScorer::new(7.0);
        let score = scorer.score_scalar("- a\n- b", None).await;
        assert!((score - 7.0).abs() < f64::EPSILON);
        assert_eq!(scorer.documents(), vec!["- a\n- b".to_owned()]);
    }

    #[tokio::test]
    async fn neutral_judge_is_all_fives() {
        let verdict = NeutralJudge.score_structured("- a").await;
        assert!(verdict.judgement.values().iter().all(|v| *v == 5));
    }
}
