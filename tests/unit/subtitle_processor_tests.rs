/*!
 * Tests for subtitle processing functionality
 */

use anyhow::Result;
use scriptdle_parser::subtitle_processor::{clean_dialogue_line, SubtitleEntry, SubtitleTrack};
use crate::common;

/// Test parsing a subtitle file from disk
#[test]
fn test_from_file_withValidSrt_shouldParseEntries() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_subtitle(&temp_dir.path().to_path_buf(), "shrek.srt")?;

    let track = SubtitleTrack::from_file(&path)?;
    assert_eq!(track.entries.len(), 4);
    assert_eq!(track.entries[2].seq_num, 3);
    assert_eq!(track.entries[2].start_time_ms, 10_000);
    assert_eq!(track.entries[2].end_time_ms, 14_000);
    assert_eq!(track.source_file, path);
    Ok(())
}

/// Test that sound cues, music and speaker labels are not dialogue
#[test]
fn test_dialogue_lines_withSoundCuesAndLabels_shouldKeepOnlySpeech() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_subtitle(&temp_dir.path().to_path_buf(), "shrek.srt")?;

    let track = SubtitleTrack::from_file(&path)?;
    assert_eq!(
        track.dialogue_lines(),
        vec![
            "Once upon a time, there was a princess.",
            "Are we there yet, are we there yet?",
        ]
    );
    assert_eq!(
        track.dialogue_text(),
        "Once upon a time, there was a princess.\nAre we there yet, are we there yet?"
    );
    Ok(())
}

/// Test that Windows line endings and a byte-order mark are tolerated
#[test]
fn test_from_srt_withCrlfAndBom_shouldParse() -> Result<()> {
    let content = "\u{feff}1\r\n00:00:01,000 --> 00:00:02,000\r\nHello there.\r\n\r\n2\r\n00:00:03,000 --> 00:00:04,000\r\nGeneral Kenobi.\r\n";
    let track = SubtitleTrack::from_srt(content)?;
    assert_eq!(track.entries.len(), 2);
    assert_eq!(track.dialogue_lines(), vec!["Hello there.", "General Kenobi."]);
    Ok(())
}

/// Test that a block with an inverted time range is skipped, not fatal
#[test]
fn test_parse_srt_string_withInvertedTimes_shouldSkipEntry() -> Result<()> {
    let content = "1\n00:00:05,000 --> 00:00:01,000\nBackwards\n\n2\n00:00:06,000 --> 00:00:07,000\nForwards\n";
    let entries = SubtitleTrack::parse_srt_string(content)?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].text, "Forwards");
    Ok(())
}

/// Test entry validation
#[test]
fn test_new_validated_withEmptyText_shouldFail() {
    assert!(SubtitleEntry::new_validated(1, 0, 1_000, "   ").is_err());
    assert!(SubtitleEntry::new_validated(1, 2_000, 1_000, "text").is_err());
    assert!(SubtitleEntry::new_validated(1, 1_000, 1_000, "text").is_ok());
}

/// Test timestamp formatting
#[test]
fn test_format_timestamp_withHours_shouldPadFields() {
    assert_eq!(SubtitleEntry::format_timestamp(0), "00:00:00,000");
    assert_eq!(SubtitleEntry::format_timestamp(3_661_001), "01:01:01,001");
}

/// Test single-line cleaning rules
#[test]
fn test_clean_dialogue_line_withVariousInputs_shouldFilter() {
    assert_eq!(clean_dialogue_line("  FIONA: Rescue me.  ").as_deref(), Some("Rescue me."));
    assert_eq!(clean_dialogue_line("(laughing)"), None);
    assert_eq!(clean_dialogue_line("♪ I'm a believer ♪"), None);
    assert_eq!(clean_dialogue_line("00:00:01,000 --> 00:00:02,000"), None);
    assert_eq!(clean_dialogue_line("<font color=\"red\">x</font>"), None);
}

/// Test that a missing file is an error
#[test]
fn test_from_file_withMissingFile_shouldFail() {
    assert!(SubtitleTrack::from_file("definitely_missing.srt").is_err());
}
