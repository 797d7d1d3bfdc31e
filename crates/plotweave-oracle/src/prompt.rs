//! Prompt template loading and rendering via `minijinja`.
//!
//! Three templates drive the oracle: `next_event`, `score` and `judge`.
//! Built-in versions are compiled into the crate. When a prompts directory
//! is configured, any `<name>.j2` file found there replaces the built-in
//! template of the same name, so operators can tune wording without
//! recompiling.

use std::path::Path;

use minijinja::{Environment, context};
use plotweave_search::ContinuationRequest;
use tracing::info;

use crate::error::OracleError;

/// Template name for next-event generation.
pub const NEXT_EVENT: &str = "next_event";

/// Template name for scalar scoring.
pub const SCORE: &str = "score";

/// Template name for the structured judge.
pub const JUDGE: &str = "judge";

const TEMPLATE_NAMES: [&str; 3] = [NEXT_EVENT, SCORE, JUDGE];

const BUILTIN_NEXT_EVENT: &str = r"You are a creative storyteller. Below are the story events so far, followed by instructions for writing the next one.

[STORY CONTEXT]
{% for event in context %}- {{ event }}
{% else %}(No prior events)
{% endfor %}
--- INSTRUCTIONS ---
- Write a single story event of two or three sentences that moves the plot forward.
- Raise the tension, reveal something new, or deepen a relationship between characters.
- Stay consistent with the events above while adding surprise or conflict.
- Do not contradict established facts or simply repeat an earlier event.
- Link ideas with cause and effect (but, therefore) without leaning on those words.
- Keep it concise and free of decoration.
{% if extra_context %}
Additional context:
{{ extra_context }}
{% endif %}{% if prior_attempts %}
Previously generated events:
{% for attempt in prior_attempts %}- {{ attempt }}
{% endfor %}Diverge significantly from these to open an alternative path in the story.
{% endif %}
Now, write the next event:
";

const BUILTIN_SCORE: &str = r"You are an expert story critic. Rate this narrative for coherence, creativity and engagement, paying close attention to how each event follows from the ones before it.

Use the full 1 to 10 range:
  - 1: incoherent, contradictory or uninteresting
  - 2 to 4: serious flaws or mostly unengaging
  - 5 to 6: passable but not strong
  - 7 to 8: coherent, interesting and mostly consistent
  - 9: excellent, fresh yet logical
  - 10: no apparent flaws
{% if constraints %}
Constraints specified by the user:
- {{ constraints }}
{% endif %}
Penalize heavily if the narrative breaks the constraints above, repeats earlier text without meaningful change, contradicts established facts, adds nothing new, or contains gibberish.

Reward novelty that stays logically consistent with prior events and the timeline.

Output only one integer from 1 to 10.

NARRATIVE:
{{ document }}
";

const BUILTIN_JUDGE: &str = r#"You are an expert story critic. Analyze the narrative below and rate it in each category on a scale from 1 (very poor) to 10 (excellent). Use the full range where warranted.

NARRATIVE:
{{ document }}

### Categories ###
1. overall_quality: how engaging, structured and fluid the story is.
2. identifying_major_flaws: freedom from inconsistencies, repetitions and unnatural patterns. Score higher when there are no glaring mistakes.
3. character_behavior: how believable and consistent the characters' actions and dialogue are.
4. common_sense_adherence: whether events agree with general world knowledge.
5. consistency: whether the story keeps its internal logic without contradictions.
6. relatedness: whether events connect logically to one another.
7. causal_temporal_relationship: how well cause and effect and chronology are handled.

After rating every category with an integer from 1 to 10, write a short paragraph of overall comments. Be strict about contradictions, unclear passages and poor transitions.

Answer only with raw JSON of this shape, with no code fences and no other text:
{"judgement": {"overall_quality": 8, "identifying_major_flaws": 7, "character_behavior": 9, "common_sense_adherence": 8, "consistency": 9, "relatedness": 8, "causal_temporal_relationship": 7}, "narrative_comments": "A concise summary of your key observations"}
"#;

/// Renders the oracle's prompts.
#[derive(Debug)]
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    /// An engine with only the built-in templates.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Template`] if a built-in template fails to
    /// compile.
    pub fn builtin() -> Result<Self, OracleError> {
        let mut env = Environment::new();
        for (name, source) in [
            (NEXT_EVENT, BUILTIN_NEXT_EVENT),
            (SCORE, BUILTIN_SCORE),
            (JUDGE, BUILTIN_JUDGE),
        ] {
            env.add_template(name, source)
                .map_err(|e| OracleError::Template(format!("failed to add {name} template: {e}")))?;
        }
        Ok(Self { env })
    }

    /// Built-in templates, replaced by any `<name>.j2` file in `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Template`] if an override cannot be read or
    /// does not compile.
    pub fn with_overrides(dir: Option<&Path>) -> Result<Self, OracleError> {
        let mut engine = Self::builtin()?;
        let Some(dir) = dir else {
            return Ok(engine);
        };
        for name in TEMPLATE_NAMES {
            let path = dir.join(format!("{name}.j2"));
            if !path.is_file() {
                continue;
            }
            let source = std::fs::read_to_string(&path).map_err(|e| {
                OracleError::Template(format!("failed to read {}: {e}", path.display()))
            })?;
            engine
                .env
                .add_template_owned(name, source)
                .map_err(|e| OracleError::Template(format!("failed to add {name} template: {e}")))?;
            info!(template = name, path = %path.display(), "loaded prompt override");
        }
        Ok(engine)
    }

    /// Prompt asking for the next event of `request.context`.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Template`] if rendering fails.
    pub fn render_next_event(&self, request: &ContinuationRequest<'_>) -> Result<String, OracleError> {
        self.render(
            NEXT_EVENT,
            context! {
                context => request.context,
                prior_attempts => request.prior_attempts,
                extra_context => request.extra_context.filter(|s| !s.trim().is_empty()),
            },
        )
    }

    /// Prompt asking for a 1-10 score of `document`.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Template`] if rendering fails.
    pub fn render_score(&self, document: &str, constraints: Option<&str>) -> Result<String, OracleError> {
        self.render(
            SCORE,
            context! {
                document => document,
                constraints => constraints.filter(|s| !s.trim().is_empty()),
            },
        )
    }

    /// Prompt asking for a seven-dimension verdict on `document`.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Template`] if rendering fails.
    pub fn render_judge(&self, document: &str) -> Result<String, OracleError> {
        self.render(JUDGE, context! { document => document })
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String, OracleError> {
        self.env
            .get_template(name)
            .map_err(|e| OracleError::Template(format!("missing {name} template: {e}")))?
            .render(ctx)
            .map_err(|e| OracleError::Template(format!("{name} render failed: {e}")))
    }
}
