/*!
 * Integration tests for language-model parsing through the pipeline
 */

use std::sync::Arc;

use anyhow::Result;
use scriptdle_parser::app_config::{ChunkingConfig, Config};
use scriptdle_parser::document::DialogueLine;
use scriptdle_parser::errors::{AppError, ProviderError};
use scriptdle_parser::extraction::Source;
use scriptdle_parser::llm::backoff::BackoffPolicy;
use scriptdle_parser::llm::parser::ChunkedLlmParser;
use scriptdle_parser::pipeline::{ParseOptions, Pipeline, UnitOutcome};
use scriptdle_parser::providers::mock::MockProvider;
use crate::common;

const SHREK_RESPONSE: &str = r#"{"title": "Shrek", "lines": [
    {"character": "Shrek", "text": "Once upon a time, there was a princess."},
    {"character": "DONKEY (V.O.)", "text": "Are we there yet, are we there yet?"},
    {"character": "SHREK", "text": "No."}
]}"#;

fn llm_options() -> ParseOptions {
    ParseOptions {
        use_llm: true,
        ..ParseOptions::default()
    }
}

/// Config whose chunks break at every blank line of `three_paragraphs`
fn small_chunk_config() -> Config {
    let mut config = common::test_config();
    config.chunking = ChunkingConfig {
        chunk_size: 32,
        transcript_chunk_size: 32,
        overlap: 0,
        lookback: 0,
        ..ChunkingConfig::default()
    };
    config
}

fn three_paragraphs() -> String {
    ["x".repeat(30), "y".repeat(30), "z".repeat(30)].join("\n\n")
}

fn line(character: &str, text: &str) -> DialogueLine {
    DialogueLine::new(character, text).unwrap()
}

/// Test that a text file parsed by the model yields a normalized document
#[tokio::test]
async fn test_parse_file_withLlm_shouldNormalizeModelOutput() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(&temp_dir.path().to_path_buf(), "draft.txt", &common::sample_screenplay())?;

    let mock = MockProvider::scripted([SHREK_RESPONSE]);
    let pipeline = Pipeline::new(common::test_config()).with_provider(Arc::new(mock.clone()));
    let parsed = pipeline.parse_file(&path, &llm_options()).await?;

    assert!(parsed.warnings.is_empty());
    assert_eq!(parsed.document.title(), "Shrek");
    assert_eq!(parsed.document.characters(), ["DONKEY", "SHREK"]);
    assert_eq!(parsed.document.lines()[1], line("DONKEY", "Are we there yet, are we there yet?"));
    assert_eq!(mock.request_count(), 1);
    assert!(mock.requests()[0].prompt.contains("Once upon a time"));
    Ok(())
}

/// Test that lines repeated across a chunk boundary are kept once
#[tokio::test]
async fn test_parse_text_withOverlappingChunks_shouldDeduplicateBoundary() -> Result<()> {
    let mock = MockProvider::scripted([
        r#"{"lines": [{"character": "A", "text": "One."}, {"character": "B", "text": "Two."}]}"#,
        r#"{"lines": [{"character": "B", "text": "Two."}, {"character": "C", "text": "Three."}]}"#,
    ]);
    let config = small_chunk_config();
    let parser = ChunkedLlmParser::from_config(Arc::new(mock.clone()), &config);

    let text = format!("{}\n\n{}", "a".repeat(30), "b".repeat(30));
    let outcome = parser.parse(&text, "Title", None).await?;

    assert_eq!(outcome.report.chunks_total, 2);
    assert_eq!(
        outcome.document.lines(),
        [line("A", "One."), line("B", "Two."), line("C", "Three.")]
    );
    Ok(())
}

/// Test that an unusable chunk degrades the unit instead of failing it
#[tokio::test]
async fn test_parse_source_withRefusedChunk_shouldBeDegraded() -> Result<()> {
    common::init_logger();
    let mock = MockProvider::scripted([
        r#"{"lines": [{"character": "A", "text": "First."}]}"#,
        "Sorry, I can't help with that.",
        r#"{"lines": [{"character": "C", "text": "Third."}]}"#,
    ]);
    let pipeline = Pipeline::new(small_chunk_config()).with_provider(Arc::new(mock));

    let outcome = UnitOutcome::from(
        pipeline
            .parse_source(Source::Text(three_paragraphs()), &llm_options(), "Fallback")
            .await,
    );

    match outcome {
        UnitOutcome::Degraded { document, reasons } => {
            assert_eq!(document.lines().len(), 2);
            assert_eq!(document.title(), "Fallback");
            assert_eq!(reasons, vec!["1 of 3 chunks dropped".to_string()]);
        }
        other => panic!("Expected degraded outcome, got {}", other.status()),
    }
    Ok(())
}

/// Test that a chunk stuck behind the rate limit costs only its own lines
#[tokio::test]
async fn test_parse_source_withOneChunkAlwaysThrottled_shouldBeDegraded() -> Result<()> {
    let mock = MockProvider::scripted([
        r#"{"lines": [{"character": "A", "text": "First."}]}"#,
        r#"{"lines": [{"character": "C", "text": "Third."}]}"#,
    ])
    .throttling_prompts_containing("zzzz");
    let pipeline = Pipeline::new(small_chunk_config()).with_provider(Arc::new(mock));

    let outcome = UnitOutcome::from(
        pipeline
            .parse_source(Source::Text(three_paragraphs()), &llm_options(), "Fallback")
            .await,
    );

    match outcome {
        UnitOutcome::Degraded { document, reasons } => {
            assert_eq!(document.lines().len(), 2);
            assert_eq!(reasons, vec!["1 of 3 chunks rate-limited".to_string()]);
        }
        other => panic!("Expected degraded outcome, got {}", other.status()),
    }
    Ok(())
}

/// Test that a truncated response is repaired rather than dropped
#[tokio::test]
async fn test_parse_source_withTruncatedResponse_shouldSalvageLines() -> Result<()> {
    let mock = MockProvider::truncated().with_responses([
        r#"{"lines": [{"character": "A", "text": "One."}, {"character": "B", "text": "Two."}, {"character": "C", "text": "Three, and a good deal more text here."}]}"#,
    ]);
    let pipeline = Pipeline::new(common::test_config()).with_provider(Arc::new(mock));

    let parsed = pipeline
        .parse_source(Source::Text(common::sample_screenplay()), &llm_options(), "Shrek")
        .await?;
    assert_eq!(parsed.document.lines().len(), 2);
    assert!(parsed.warnings.is_empty());
    Ok(())
}

/// Test that rate limiting past the retry budget fails the unit
#[tokio::test]
async fn test_parse_source_withPersistentRateLimit_shouldFailUnit() -> Result<()> {
    let mock = MockProvider::rate_limited(10);
    let mut config = common::test_config();
    config.backoff = BackoffPolicy::immediate(2);
    let pipeline = Pipeline::new(config).with_provider(Arc::new(mock.clone()));

    let result = pipeline
        .parse_source(Source::Text(common::sample_screenplay()), &llm_options(), "Shrek")
        .await;

    assert!(matches!(
        result,
        Err(AppError::Provider(ProviderError::RetriesExhausted { attempts: 2, .. }))
    ));
    assert_eq!(mock.request_count(), 2);
    Ok(())
}

/// Test that transient rate limits are retried transparently
#[tokio::test]
async fn test_parse_source_withTransientRateLimit_shouldSucceed() -> Result<()> {
    let mock = MockProvider::rate_limited(2).with_responses([SHREK_RESPONSE]);
    let pipeline = Pipeline::new(common::test_config()).with_provider(Arc::new(mock.clone()));

    let parsed = pipeline
        .parse_source(Source::Text(common::sample_screenplay()), &llm_options(), "Shrek")
        .await?;
    assert_eq!(parsed.document.lines().len(), 3);
    assert_eq!(mock.request_count(), 3);
    Ok(())
}

/// Test that wiki transcripts are sent with the transcript prompt
#[tokio::test]
async fn test_parse_source_withWikiPage_shouldUseTranscriptPrompt() -> Result<()> {
    let html = r#"<html><body><div class="mw-parser-output">
        <p>Shrek: Get out of my swamp!</p>
        <p>Donkey: I'm making waffles!</p>
        </div></body></html>"#;
    let mock = MockProvider::working();
    let pipeline = Pipeline::new(common::test_config()).with_provider(Arc::new(mock.clone()));

    let parsed = pipeline
        .parse_source(Source::WikiHtml(html.to_string()), &llm_options(), "Shrek")
        .await?;

    assert_eq!(parsed.document.title(), "Mock Movie");
    assert!(mock.requests()[0].prompt.starts_with("Parse this transcript chunk."));
    Ok(())
}
