/*!
 * Tests for the canonical document records
 */

use anyhow::Result;
use scriptdle_parser::document::{DialogueLine, FusedDialogue, ScriptDocument};
use scriptdle_parser::file_utils::FileManager;
use crate::common;

fn line(c: &str, t: &str) -> DialogueLine {
    DialogueLine::new(c, t).unwrap()
}

/// Test that a document written to disk reads back with the same content
#[test]
fn test_write_json_withDocument_shouldReadBackIdentical() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("out").join("shrek.json");
    let doc = ScriptDocument::titled("Shrek", Some(2001), vec![
        line("SHREK", "Get out of my swamp!"),
        line("DONKEY", "Hi!"),
    ]);

    FileManager::write_json(&path, &doc)?;
    let loaded: ScriptDocument = serde_json::from_str(&FileManager::read_to_string(&path)?)?;

    assert_eq!(loaded, doc);
    assert_eq!(loaded.characters(), ["DONKEY", "SHREK"]);
    Ok(())
}

/// Test that metadata overrides keep lines and order intact
#[test]
fn test_with_metadata_withOverrides_shouldKeepLinesInOrder() {
    let doc = ScriptDocument::titled("draft", None, vec![line("B", "two"), line("A", "one")]);
    let doc = doc.with_metadata(Some("shrek-2001".into()), Some("Shrek".into()), Some(2001));

    assert_eq!(doc.id(), "shrek-2001");
    assert_eq!(doc.title(), "Shrek");
    assert_eq!(doc.year(), Some(2001));
    let texts: Vec<&str> = doc.lines().iter().map(|l| l.text.as_str()).collect();
    assert_eq!(texts, vec!["two", "one"]);
}

/// Test that empty metadata overrides fall back to the current values
#[test]
fn test_with_metadata_withEmptyStrings_shouldKeepCurrent() {
    let doc = ScriptDocument::titled("Shrek", Some(2001), vec![line("SHREK", "Hi")]);
    let doc = doc.with_metadata(Some(String::new()), Some(String::new()), None);
    assert_eq!(doc.id(), "shrek");
    assert_eq!(doc.title(), "Shrek");
    assert_eq!(doc.year(), Some(2001));
}

/// Test that the roster of every document matches its lines
#[test]
fn test_characters_withManyShapes_shouldEqualSortedUniqueSpeakers() {
    let shapes = vec![
        vec![],
        vec![line("Z", "a")],
        vec![line("B", "a"), line("A", "b"), line("B", "c"), line("C", "d")],
    ];
    for lines in shapes {
        let doc = ScriptDocument::from_parts("id", "t", None, lines.clone());
        let mut expected: Vec<String> = lines.iter().map(|l| l.character.clone()).collect();
        expected.sort();
        expected.dedup();
        assert_eq!(doc.characters(), expected.as_slice());
    }
}

/// Test that fused dialogue converts into a canonical document
#[test]
fn test_to_script_document_withFusedLines_shouldDeriveRoster() {
    let fused = FusedDialogue {
        movie: "Storm".into(),
        year: Some(1999),
        subtitle_source: "storm.srt".into(),
        script_source: "storm.pdf".into(),
        script_overlap_score: 0.8,
        lines: vec![line("MARY", "Go."), line("JOHN", "Now?")],
        extraction_time: "2024-01-01T00:00:00+00:00".into(),
        elapsed_secs: 1.5,
        total_subtitle_lines: 2,
        fusion_coverage: 1.0,
        low_confidence: false,
    };
    let doc = fused.to_script_document();
    assert_eq!(doc.id(), "storm");
    assert_eq!(doc.characters(), ["JOHN", "MARY"]);
    assert_eq!(doc.lines().len(), 2);
}
