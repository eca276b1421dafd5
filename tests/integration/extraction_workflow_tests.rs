/*!
 * Integration tests from source files through extraction to parsed documents
 */

use anyhow::Result;
use scriptdle_parser::document::DialogueLine;
use scriptdle_parser::errors::{AppError, ExtractionError};
use scriptdle_parser::extraction::{Extracted, ExtractorChain, Source};
use scriptdle_parser::parser::{HeuristicParser, SourceFamily};
use scriptdle_parser::pipeline::{ParseOptions, Pipeline, UnitOutcome};
use crate::common;

const ROLE_HTML: &str = r#"<html><body>
<p id="slug">EXT. SWAMP - DAY</p>
<p id="act">An ogre bursts out of the outhouse.</p>
<p id="speaker">SHREK</p><p id="dia">What are you doing in my swamp?</p>
<p id="speaker">DONKEY</p><p id="spkdir">nervously</p><p id="dia">Talking!</p>
<p id="speaker">SHREK</p><p id="dia">Go away.</p>
</body></html>"#;

const WIKI_HTML: &str = r#"<!DOCTYPE html><html><body>
<div id="toc">Contents</div>
<div class="mw-parser-output">
<p>Shrek: [laughs] Get out of my swamp!</p>
<p>Scene: The swamp at dawn.</p>
<p>Donkey: I'm making waffles!</p>
</div>
</body></html>"#;

fn line(character: &str, text: &str) -> DialogueLine {
    DialogueLine::new(character, text).unwrap()
}

/// Test that a plain-text screenplay on disk parses with the heuristic parser
#[tokio::test]
async fn test_parse_file_withPlainTextScreenplay_shouldExtractDialogue() -> Result<()> {
    common::init_logger();
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(
        &temp_dir.path().to_path_buf(),
        "shrek_script.txt",
        &common::sample_screenplay(),
    )?;

    let pipeline = Pipeline::new(common::test_config());
    let parsed = pipeline.parse_file(&path, &ParseOptions::default()).await?;

    assert!(parsed.warnings.is_empty());
    let document = parsed.document;
    assert_eq!(document.title(), "shrek script");
    assert_eq!(document.characters(), ["DONKEY", "SHREK"]);
    assert_eq!(
        document.lines(),
        [
            line("SHREK", "Once upon a time, there was a princess."),
            line("DONKEY", "Are we there yet, are we there yet?"),
            line("SHREK", "No."),
        ]
    );
    Ok(())
}

/// Test that explicit options override the file-derived metadata
#[tokio::test]
async fn test_parse_file_withExplicitMetadata_shouldUseIt() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(&temp_dir.path().to_path_buf(), "draft.txt", &common::sample_screenplay())?;

    let options = ParseOptions {
        id: Some("shrek-2001".to_string()),
        title: Some("Shrek".to_string()),
        year: Some(2001),
        ..ParseOptions::default()
    };
    let parsed = Pipeline::new(common::test_config()).parse_file(&path, &options).await?;

    assert_eq!(parsed.document.id(), "shrek-2001");
    assert_eq!(parsed.document.title(), "Shrek");
    assert_eq!(parsed.document.year(), Some(2001));
    Ok(())
}

/// Test that role-tagged HTML takes the structured path
#[tokio::test]
async fn test_extract_withRoleTaggedHtml_shouldUseStructuredFamily() -> Result<()> {
    let source = Source::Html(ROLE_HTML.to_string());
    let config = common::test_config();
    let extraction = ExtractorChain::for_source(&source, &config.extraction).extract(&source).await?;

    assert_eq!(extraction.strategy, "html-roles");
    assert_eq!(extraction.family, SourceFamily::Structured);
    assert!(!extraction.is_degraded());

    let document = HeuristicParser::for_family(extraction.family, &config.parser).parse_document(
        extraction.content,
        "Shrek",
        Some(2001),
    );
    assert_eq!(
        document.lines(),
        [
            line("SHREK", "What are you doing in my swamp?"),
            line("DONKEY", "Talking!"),
            line("SHREK", "Go away."),
        ]
    );
    Ok(())
}

/// Test that HTML without role markup falls back to the layout walk
#[tokio::test]
async fn test_extract_withPreformattedHtml_shouldFallBackToWalk() -> Result<()> {
    let html = format!("<html><body><pre>{}</pre></body></html>", common::sample_screenplay());
    let source = Source::Html(html);
    let config = common::test_config();
    let extraction = ExtractorChain::for_source(&source, &config.extraction).extract(&source).await?;

    assert_eq!(extraction.strategy, "html-walk");
    assert!(extraction.is_degraded());
    assert_eq!(extraction.failures.len(), 1);
    assert!(extraction.failures[0].starts_with("html-roles"));
    Ok(())
}

/// Test that wiki transcripts parse as `NAME: speech` lines without page chrome
#[tokio::test]
async fn test_parse_source_withWikiTranscript_shouldUseTranscriptCues() -> Result<()> {
    let pipeline = Pipeline::new(common::test_config());
    let parsed = pipeline
        .parse_source(Source::WikiHtml(WIKI_HTML.to_string()), &ParseOptions::default(), "Shrek")
        .await?;

    assert_eq!(
        parsed.document.lines(),
        [line("SHREK", "Get out of my swamp!"), line("DONKEY", "I'm making waffles!")]
    );
    assert!(parsed.warnings.is_empty());
    Ok(())
}

/// Test that a wiki file on disk is detected from its markup
#[tokio::test]
async fn test_parse_file_withWikiHtmlFile_shouldDetectTranscript() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(&temp_dir.path().to_path_buf(), "shrek_transcript.html", WIKI_HTML)?;

    let parsed = Pipeline::new(common::test_config()).parse_file(&path, &ParseOptions::default()).await?;
    assert_eq!(parsed.document.characters(), ["DONKEY", "SHREK"]);
    Ok(())
}

/// Test that symbol soup is rejected instead of parsed
#[tokio::test]
async fn test_parse_file_withGarbageText_shouldFailExtraction() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(
        &temp_dir.path().to_path_buf(),
        "broken.txt",
        &"%#@$%#@$%#@$ %#@$\n".repeat(40),
    )?;

    let result = Pipeline::new(common::test_config()).parse_file(&path, &ParseOptions::default()).await;
    match result {
        Err(AppError::Extraction(ExtractionError::Exhausted(reasons))) => {
            assert_eq!(reasons.len(), 1);
            assert!(reasons[0].starts_with("text"));
        }
        other => panic!("Expected exhausted extraction, got {:?}", other.map(|p| p.document)),
    }
    Ok(())
}

/// Test that forcing a parser family overrides the extractor's choice
#[tokio::test]
async fn test_parse_source_withForcedTranscriptFamily_shouldParseLabels() -> Result<()> {
    let text = "SHREK: Get out of my swamp!\nDONKEY: I'm making waffles!\n";
    let options = ParseOptions {
        family: Some(SourceFamily::Transcript),
        ..ParseOptions::default()
    };
    let parsed = Pipeline::new(common::test_config())
        .parse_source(Source::Text(text.to_string()), &options, "Shrek")
        .await?;
    assert_eq!(parsed.document.lines().len(), 2);

    let outcome = UnitOutcome::from(
        Pipeline::new(common::test_config())
            .parse_source(Source::Text(text.to_string()), &ParseOptions::default(), "Shrek")
            .await,
    );
    assert_eq!(outcome.status(), "degraded");
    Ok(())
}

/// Test flattening of layout elements back into indented text
#[test]
fn test_to_text_withElements_shouldRenderIndent() {
    let extracted = Extracted::Text("  SHREK".to_string());
    let elements = extracted.clone().into_elements();
    assert_eq!(elements[0].indent, 2);
    assert_eq!(Extracted::Elements(elements).to_text(), extracted.to_text());
}
