//! LLM reply parsing for scores and verdicts.
//!
//! Neither parser fails outward. A scalar reply without a usable integer
//! becomes the neutral score, and a judge reply that cannot be read becomes
//! an all-neutral verdict carrying the raw reply. Both log a warning.

use plotweave_search::ports::{MAX_SCORE, MIN_SCORE, NEUTRAL_SCORE};
use plotweave_types::JudgeVerdict;
use tracing::warn;

/// Why a scalar reply was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
enum ScoreFormatError {
    #[error("no integer in reply")]
    NoInteger,

    #[error("score {0} is outside 1..=10")]
    OutOfRange(String),
}

/// Read the first integer in `raw` as a 1-10 score.
fn parse_scalar_score(raw: &str) -> Result<u8, ScoreFormatError> {
    let start = raw
        .find(|c: char| c.is_ascii_digit())
        .ok_or(ScoreFormatError::NoInteger)?;
    let digits = raw
        .get(start..)
        .map(|rest| {
            let end = rest
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(rest.len());
            rest.get(..end).unwrap_or_default()
        })
        .unwrap_or_default();

    digits
        .parse::<u8>()
        .ok()
        .filter(|score| (MIN_SCORE..=MAX_SCORE).contains(&f64::from(*score)))
        .ok_or_else(|| ScoreFormatError::OutOfRange(digits.to_owned()))
}

/// The score in `raw`, or [`NEUTRAL_SCORE`] if there is none in range.
pub fn score_or_neutral(raw: &str) -> f64 {
    match parse_scalar_score(raw) {
        Ok(score) => f64::from(score),
        Err(e) => {
            warn!(error = %e, raw_response = raw, "unusable score, using neutral");
            NEUTRAL_SCORE
        }
    }
}

/// Parse a judge reply, falling back to a neutral verdict.
///
/// Tries the reply as-is, then the contents of a markdown code block, each
/// also with trailing commas stripped. A verdict with any dimension outside
/// 1-10 counts as unparsable.
pub fn parse_judge_verdict(raw: &str) -> JudgeVerdict {
    match try_parse_judge(raw) {
        Some(verdict) => verdict,
        None => {
            warn!(raw_response = raw, "failed to parse judge reply, using neutral verdict");
            JudgeVerdict::fallback(format!("Could not parse JSON. Raw response:\n{raw}"))
        }
    }
}

fn try_parse_judge(raw: &str) -> Option<JudgeVerdict> {
    let trimmed = raw.trim();
    let block = extract_json_from_codeblock(trimmed);
    let candidates = [Some(trimmed), block]
        .into_iter()
        .flatten()
        .flat_map(|text| [text.to_owned(), strip_trailing_commas(text)]);

    for candidate in candidates {
        if let Ok(verdict) = serde_json::from_str::<JudgeVerdict>(&candidate) {
            if let Some((dimension, value)) = verdict.judgement.out_of_range() {
                warn!(dimension, value, "judge score out of range");
                return None;
            }
            return Some(verdict);
        }
    }
    None
}

/// Extract the body of the first markdown code block.
fn extract_json_from_codeblock(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_fence = text.get(open.checked_add(3)?..)?;
    // Skip an info string such as `json` up to the end of the line.
    let body_start = after_fence.find('\n').map_or(0, |nl| nl.saturating_add(1));
    let body = after_fence.get(body_start..)?;
    let end = body.find("```")?;
    body.get(..end).map(str::trim)
}

/// Strip trailing commas before closing braces and brackets.
fn strip_trailing_commas(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == ',' {
            let rest = chars.clone().find(|n| !n.is_whitespace());
            if matches!(rest, Some('}' | ']')) {
                continue;
            }
        }
        result.push(c);
    }
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const VALID: &str = r#"{"judgement": {"overall_quality": 8, "identifying_major_flaws": 7, "character_behavior": 9, "common_sense_adherence": 8, "consistency": 9, "relatedness": 8, "causal_temporal_relationship": 7}, "narrative_comments": "Tight pacing."}"#;

    #[test]
    fn first_integer_wins() {
        assert_eq!(parse_scalar_score("7"), Ok(7));
        assert_eq!(parse_scalar_score("Score: 8/10"), Ok(8));
        assert_eq!(parse_scalar_score("  10\n"), Ok(10));
    }

    #[test]
    fn missing_or_out_of_range_scores_are_errors() {
        assert_eq!(parse_scalar_score("great story"), Err(ScoreFormatError::NoInteger));
        assert_eq!(
            parse_scalar_score("0"),
            Err(ScoreFormatError::OutOfRange("0".to_owned()))
        );
        assert_eq!(
            parse_scalar_score("11 out of 10"),
            Err(ScoreFormatError::OutOfRange("11".to_owned()))
        );
        assert!(parse_scalar_score("99999999999999999999").is_err());
    }

    #[test]
    fn neutral_fallback() {
        assert!((score_or_neutral("nine") - 5.0).abs() < f64::EPSILON);
        assert!((score_or_neutral("42") - 5.0).abs() < f64::EPSILON);
        assert!((score_or_neutral("9") - 9.0).abs() < f64::EPSILON);
    }

    #[test]
    fn judge_direct_json() {
        let verdict = parse_judge_verdict(VALID);
        assert_eq!(verdict.judgement.character_behavior, 9);
        assert_eq!(verdict.narrative_comments, "Tight pacing.");
    }

    #[test]
    fn judge_from_codeblock_with_trailing_comma() {
        let raw = format!("Here you go:\n```json\n{}\n```", VALID.replace("\"Tight pacing.\"}", "\"Tight pacing.\",}"));
        let verdict = parse_judge_verdict(&raw);
        assert_eq!(verdict.judgement.overall_quality, 8);
    }

    #[test]
    fn judge_garbage_falls_back() {
        let verdict = parse_judge_verdict("I liked it.");
        assert_eq!(verdict.judgement.values(), [5; 7]);
        assert!(verdict.narrative_comments.starts_with("Could not parse JSON. Raw response:\n"));
        assert!(verdict.narrative_comments.ends_with("I liked it."));
    }

    #[test]
    fn judge_out_of_range_falls_back() {
        let raw = VALID.replace("\"consistency\": 9", "\"consistency\": 12");
        let verdict = parse_judge_verdict(&raw);
        assert_eq!(verdict.judgement.consistency, 5);
        assert!(verdict.narrative_comments.contains("Could not parse JSON"));
    }

    #[test]
    fn strip_commas() {
        assert_eq!(strip_trailing_commas("{\"a\": 1, }"), "{\"a\": 1 }");
        assert_eq!(strip_trailing_commas("[1, 2,]"), "[1, 2]");
        assert_eq!(strip_trailing_commas("a, b"), "a, b");
    }
}
