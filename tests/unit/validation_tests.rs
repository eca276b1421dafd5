/*!
 * Tests for overlap scoring and candidate selection
 */

use anyhow::Result;
use scriptdle_parser::app_config::ValidationConfig;
use scriptdle_parser::subtitle_processor::SubtitleTrack;
use scriptdle_parser::validation::{
    normalize_for_comparison, rank_candidates, select_best, validate, OverlapValidator, ScriptCandidate,
};
use crate::common;

fn config() -> ValidationConfig {
    ValidationConfig {
        min_script_chars: 10,
        ..ValidationConfig::default()
    }
}

/// Test that a script containing every subtitle line scores one
#[test]
fn test_validate_withMatchingScreenplay_shouldScoreOne() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_subtitle(&temp_dir.path().to_path_buf(), "shrek.srt")?;
    let lines = SubtitleTrack::from_file(&path)?.dialogue_lines();

    let result = validate(&common::sample_screenplay(), &lines, &config());
    assert_eq!(result.total_checked, 2);
    assert_eq!(result.matched_lines, 2);
    assert!((result.overlap_score - 1.0).abs() < f64::EPSILON);
    assert!(!result.low_confidence);
    assert_eq!(result.sample_matches.len(), 2);
    Ok(())
}

/// Test that punctuation and case differences do not prevent a match
#[test]
fn test_validate_withPunctuationDifferences_shouldMatch() {
    let lines = vec!["WHAT are you doing... in my swamp?!".to_string()];
    let result = validate("SHREK\nWhat are you doing in my swamp", &lines, &config());
    assert_eq!(result.matched_lines, 1);
}

/// Test that the score is always within the unit interval
#[test]
fn test_validate_withMixedLines_shouldStayWithinBounds() {
    let lines = vec![
        "Once upon a time, there was a princess.".to_string(),
        "This line is nowhere in the script text.".to_string(),
        "Nor is this one, I am afraid to say.".to_string(),
        "No".to_string(),
    ];
    let result = validate(&common::sample_screenplay(), &lines, &config());
    assert_eq!(result.total_checked, 3);
    assert_eq!(result.matched_lines, 1);
    assert!(result.overlap_score > 0.0 && result.overlap_score < 1.0);
}

/// Test that a configured confidence floor sets the low-confidence flag
#[test]
fn test_validate_withHighConfidenceFloor_shouldFlagLowConfidence() {
    let strict = ValidationConfig {
        min_confidence: 0.9,
        ..config()
    };
    let lines = vec![
        "Once upon a time, there was a princess.".to_string(),
        "This line is nowhere in the script text.".to_string(),
    ];
    let result = OverlapValidator::new(strict).validate(&common::sample_screenplay(), &lines);
    assert!((result.overlap_score - 0.5).abs() < f64::EPSILON);
    assert!(result.low_confidence);
}

/// Test comparison normalization
#[test]
fn test_normalize_for_comparison_withMixedInput_shouldCanonicalize() {
    assert_eq!(normalize_for_comparison("  Are we THERE yet?!  "), "are we there yet");
    assert_eq!(normalize_for_comparison("don't-stop"), "don't stop");
}

/// Test that ranking puts the matching script first
#[test]
fn test_rank_candidates_withRealAndDecoyScripts_shouldRankRealFirst() {
    let lines = vec![
        "Once upon a time, there was a princess.".to_string(),
        "Are we there yet, are we there yet?".to_string(),
    ];
    let ranked = rank_candidates(
        vec![
            ScriptCandidate::new("decoy.txt", "A long script about something else entirely, with no shared lines."),
            ScriptCandidate::new("shrek.txt", common::sample_screenplay()),
        ],
        &lines,
        &config(),
    );
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].candidate.source, "shrek.txt");
    assert_eq!(ranked[1].result.matched_lines, 0);
}

/// Test that selection over no usable candidates yields nothing
#[test]
fn test_select_best_withOnlyTinyCandidates_shouldReturnNone() {
    let lines = vec!["Once upon a time, there was a princess.".to_string()];
    let best = select_best(vec![ScriptCandidate::new("tiny", "Hi")], &lines, &ValidationConfig::default());
    assert!(best.is_none());
    assert!(select_best(Vec::new(), &lines, &config()).is_none());
}
