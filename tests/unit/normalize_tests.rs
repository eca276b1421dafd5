/*!
 * Tests for the text normalizer
 */

use scriptdle_parser::document::DialogueLine;
use scriptdle_parser::normalize::{
    correct_ocr, detect_character_at_end, normalize_character, normalize_line, normalize_text, strip_artifacts,
};

const SAMPLES: &[&str] = &[
    "",
    "   ",
    "I'11 be fine, Mom.",
    "YELLOW REVISED 3/14/97 Tbe dragon won'1 wait.",
    "<< Bonjour >> said the waiter.  42",
    "He stops.   PAGE 12",
    "a1b1c1d D0N0KEY",
    "12.\nWhere are we?",
    "Wbat?!  Wby would you do tbat?",
    "Ünïcödé text with 1 and 0 digits",
];

/// Test that normalize_text is idempotent on assorted input
#[test]
fn test_normalize_text_withAssortedInput_shouldBeIdempotent() {
    for sample in SAMPLES {
        let once = normalize_text(sample);
        assert_eq!(normalize_text(&once), once, "not idempotent for {:?}", sample);
    }
}

/// Test that normalize_character is idempotent on assorted input
#[test]
fn test_normalize_character_withAssortedInput_shouldBeIdempotent() {
    for sample in SAMPLES.iter().chain(["Donkey (V.O.)", "SHREK (CONT'D)", "(O.S.) FIONA"].iter()) {
        let once = normalize_character(sample);
        assert_eq!(normalize_character(&once), once, "not idempotent for {:?}", sample);
    }
}

/// Test the full cleanup on a typical OCR line
#[test]
fn test_normalize_text_withOcrLine_shouldClean() {
    assert_eq!(normalize_text("I'11 get tbe   door.  23"), "I'll get the door.");
    assert_eq!(normalize_text("<<Hola>> amigo"), "Hola amigo");
}

/// Test OCR corrections keep the first letter's case
#[test]
fn test_correct_ocr_withCapitalisedWord_shouldPreserveCase() {
    assert_eq!(correct_ocr("Tbere it is"), "There it is");
    assert_eq!(correct_ocr("Wben? wbere?"), "When? where?");
}

/// Test revision stamps and page markers are removed
#[test]
fn test_strip_artifacts_withStampAndPage_shouldRemoveBoth() {
    assert_eq!(strip_artifacts("BLUE 10/02/98 Keep moving. PAGE 7"), "Keep moving.");
}

/// Test character names lose annotations and continuation suffixes
#[test]
fn test_normalize_character_withAnnotations_shouldReturnBareName() {
    assert_eq!(normalize_character("Donkey (V.O.)"), "DONKEY");
    assert_eq!(normalize_character("  lord  farquaad (cont'd) "), "LORD FARQUAAD");
}

/// Test a line that normalizes to nothing is discarded
#[test]
fn test_normalize_line_withOnlyArtifacts_shouldDiscard() {
    let line = DialogueLine::new("SHREK", "PAGE 12").unwrap();
    assert!(normalize_line(&line).is_none());
}

/// Test glued cue detection splits only real names after a sentence
#[test]
fn test_detect_character_at_end_withGluedCue_shouldSplit() {
    assert_eq!(
        detect_character_at_end("I'll be right back. DONKEY"),
        ("I'll be right back.".to_string(), Some("DONKEY".to_string()))
    );
    assert_eq!(
        detect_character_at_end("Are you coming or NOT"),
        ("Are you coming or NOT".to_string(), None)
    );
}
