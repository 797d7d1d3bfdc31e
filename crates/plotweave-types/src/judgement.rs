//! Structured narrative judgement.
//!
//! The judge rates a finished chain of events on seven fixed dimensions,
//! each an integer from 1 to 10, and adds free-text commentary. The field
//! names match the JSON the judge is asked to produce, so a verdict
//! deserializes straight from the model output.

use serde::{Deserialize, Serialize};

/// Lowest valid dimension score.
pub const MIN_DIMENSION_SCORE: u8 = 1;

/// Highest valid dimension score.
pub const MAX_DIMENSION_SCORE: u8 = 10;

/// Score used for every dimension when the judge cannot be read.
pub const NEUTRAL_DIMENSION_SCORE: u8 = 5;

/// Names of the seven judged dimensions, in report column order.
pub const DIMENSION_NAMES: [&str; 7] = [
    "overall_quality",
    "identifying_major_flaws",
    "character_behavior",
    "common_sense_adherence",
    "consistency",
    "relatedness",
    "causal_temporal_relationship",
];

/// Per-dimension integer scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeScores {
    /// How engaging, structured, and fluid the story is.
    pub overall_quality: u8,
    /// Freedom from inconsistencies, repetitions, and unnatural patterns.
    pub identifying_major_flaws: u8,
    /// Believability of characters' actions and dialogue.
    pub character_behavior: u8,
    /// Agreement with general world knowledge.
    pub common_sense_adherence: u8,
    /// Internal continuity.
    pub consistency: u8,
    /// How well events connect to one another.
    pub relatedness: u8,
    /// Handling of cause-and-effect and chronology.
    pub causal_temporal_relationship: u8,
}

impl JudgeScores {
    /// Every dimension at the neutral score.
    pub const NEUTRAL: Self = Self::uniform(NEUTRAL_DIMENSION_SCORE);

    /// Every dimension set to `score`.
    pub const fn uniform(score: u8) -> Self {
        Self {
            overall_quality: score,
            identifying_major_flaws: score,
            character_behavior: score,
            common_sense_adherence: score,
            consistency: score,
            relatedness: score,
            causal_temporal_relationship: score,
        }
    }

    /// Scores in [`DIMENSION_NAMES`] order.
    pub const fn values(&self) -> [u8; 7] {
        [
            self.overall_quality,
            self.identifying_major_flaws,
            self.character_behavior,
            self.common_sense_adherence,
            self.consistency,
            self.relatedness,
            self.causal_temporal_relationship,
        ]
    }

    /// The first dimension outside `1..=10`, if any.
    pub fn out_of_range(&self) -> Option<(&'static str, u8)> {
        DIMENSION_NAMES
            .into_iter()
            .zip(self.values())
            .find(|(_, v)| !(MIN_DIMENSION_SCORE..=MAX_DIMENSION_SCORE).contains(v))
    }

    /// Arithmetic mean of the seven dimensions.
    pub fn average(&self) -> f64 {
        let sum: u32 = self.values().into_iter().map(u32::from).sum();
        f64::from(sum) / 7.0
    }
}

impl Default for JudgeScores {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

/// A complete judge response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeVerdict {
    /// The seven dimension scores.
    pub judgement: JudgeScores,
    /// Free-text commentary, or an error annotation for fallback verdicts.
    pub narrative_comments: String,
}

impl JudgeVerdict {
    /// An all-neutral verdict carrying an explanation of what went wrong.
    pub fn fallback(annotation: impl Into<String>) -> Self {
        Self {
            judgement: JudgeScores::NEUTRAL,
            narrative_comments: annotation.into(),
        }
    }
}
