use log::{info, warn};

use crate::app_config::ValidationConfig;
use crate::document::ValidationResult;
use crate::validation::overlap::OverlapValidator;

/// A candidate script for one title
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptCandidate {
    /// Where the script came from (path or URL)
    pub source: String,
    /// Flat script text
    pub text: String,
}

impl ScriptCandidate {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }
}

/// A candidate together with its score against one subtitle track
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub candidate: ScriptCandidate,
    pub result: ValidationResult,
}

/// Score every candidate and order them best first.
///
/// Candidates shorter than `min_script_chars` are skipped. Ties keep the
/// input order.
pub fn rank_candidates(
    candidates: Vec<ScriptCandidate>,
    subtitle_lines: &[String],
    config: &ValidationConfig,
) -> Vec<RankedCandidate> {
    let validator = OverlapValidator::new(config.clone());
    let mut ranked: Vec<RankedCandidate> = candidates
        .into_iter()
        .filter_map(|candidate| {
            let chars = candidate.text.chars().count();
            if chars < config.min_script_chars {
                info!("Skipping {}: only {} chars of text", candidate.source, chars);
                return None;
            }
            let result = validator.validate(&candidate.text, subtitle_lines);
            info!(
                "{}: overlap {:.1}% ({}/{} lines)",
                candidate.source,
                result.overlap_score * 100.0,
                result.matched_lines,
                result.total_checked
            );
            Some(RankedCandidate { candidate, result })
        })
        .collect();

    ranked.sort_by(|a, b| b.result.overlap_score.total_cmp(&a.result.overlap_score));
    ranked
}

/// The best candidate, even when its score is low. Low confidence is
/// logged and carried on the result rather than rejected.
pub fn select_best(
    candidates: Vec<ScriptCandidate>,
    subtitle_lines: &[String],
    config: &ValidationConfig,
) -> Option<RankedCandidate> {
    let best = rank_candidates(candidates, subtitle_lines, config).into_iter().next()?;
    if best.result.low_confidence {
        warn!(
            "Best script {} has low overlap ({:.1}% < {:.1}%); results may be poor",
            best.candidate.source,
            best.result.overlap_score * 100.0,
            config.min_confidence * 100.0
        );
    } else {
        info!("Best match: {} ({:.1}% overlap)", best.candidate.source, best.result.overlap_score * 100.0);
    }
    Some(best)
}
