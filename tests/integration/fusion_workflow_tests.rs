/*!
 * Integration tests for candidate selection and subtitle fusion
 */

use std::sync::Arc;

use anyhow::Result;
use scriptdle_parser::pipeline::Pipeline;
use scriptdle_parser::providers::mock::MockProvider;
use crate::common;

const FUSED_RESPONSE: &str = r#"{"lines": [
    {"character": "Shrek", "dialogue": "Once upon a time, there was a princess."},
    {"character": "DONKEY (V.O.)", "dialogue": "Are we there yet, are we there yet?"}
]}"#;

const DECOY: &str = "MERLIN\nThe wizard speaks of distant lands and forgotten kings.\n";

/// Test that the matching script wins and its speakers land on the subtitle text
#[tokio::test]
async fn test_fuse_files_withScreenplayAndDecoy_shouldFuseScreenplay() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path().to_path_buf();
    let subtitle = common::create_test_subtitle(&dir, "shrek.srt")?;
    let decoy = common::create_test_file(&dir, "decoy.txt", &DECOY.repeat(3))?;
    let script = common::create_test_file(&dir, "shrek.txt", &common::sample_screenplay())?;

    let mock = MockProvider::scripted([FUSED_RESPONSE]);
    let pipeline = Pipeline::new(common::test_config()).with_provider(Arc::new(mock.clone()));
    let outcome = pipeline.fuse_files(&subtitle, &[decoy, script], "Shrek", Some(2001)).await?;
    let fused = outcome.fused;

    assert!(fused.script_source.ends_with("shrek.txt"));
    assert!(fused.subtitle_source.ends_with("shrek.srt"));
    assert!((fused.script_overlap_score - 1.0).abs() < 1e-9);
    assert!(!fused.low_confidence);
    assert_eq!(fused.total_subtitle_lines, 2);
    assert!((fused.fusion_coverage - 1.0).abs() < 1e-9);
    assert_eq!(fused.lines[0].character, "SHREK");
    assert_eq!(fused.lines[1].character, "DONKEY");

    let document = fused.to_script_document();
    assert_eq!(document.id(), "shrek");
    assert_eq!(document.year(), Some(2001));
    assert_eq!(document.characters(), ["DONKEY", "SHREK"]);

    let prompt = &mock.requests()[0].prompt;
    assert!(prompt.contains("Are we there yet"));
    assert!(!prompt.contains("Door creaks"));
    Ok(())
}

/// Test that coverage never exceeds one even when the model over-produces
#[tokio::test]
async fn test_fuse_files_withExtraModelLines_shouldCapCoverage() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path().to_path_buf();
    let subtitle = common::create_test_subtitle(&dir, "shrek.srt")?;
    let script = common::create_test_file(&dir, "shrek.txt", &common::sample_screenplay())?;

    let mock = MockProvider::scripted([r#"{"lines": [
        {"character": "SHREK", "dialogue": "Once upon a time, there was a princess."},
        {"character": "DONKEY", "dialogue": "Are we there yet, are we there yet?"},
        {"character": "SHREK", "dialogue": "No."}
    ]}"#]);
    let pipeline = Pipeline::new(common::test_config()).with_provider(Arc::new(mock));
    let outcome = pipeline.fuse_files(&subtitle, &[script], "Shrek", None).await?;

    assert_eq!(outcome.fused.lines.len(), 3);
    assert!((outcome.fused.fusion_coverage - 1.0).abs() < f64::EPSILON);
    Ok(())
}

/// Test that a low-scoring best candidate is still fused, with the flag set
#[tokio::test]
async fn test_fuse_files_withOnlyDecoy_shouldFlagLowConfidence() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path().to_path_buf();
    let subtitle = common::create_test_subtitle(&dir, "shrek.srt")?;
    let decoy = common::create_test_file(&dir, "decoy.txt", &DECOY.repeat(3))?;

    let pipeline = Pipeline::new(common::test_config()).with_provider(Arc::new(MockProvider::scripted([FUSED_RESPONSE])));
    let outcome = pipeline.fuse_files(&subtitle, &[decoy], "Shrek", None).await?;

    assert_eq!(outcome.fused.script_overlap_score, 0.0);
    assert!(outcome.fused.low_confidence);
    Ok(())
}

/// Test that unreadable candidates are skipped and an empty field is an error
#[tokio::test]
async fn test_fuse_files_withNoUsableCandidates_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path().to_path_buf();
    let subtitle = common::create_test_subtitle(&dir, "shrek.srt")?;
    let garbage = common::create_test_file(&dir, "broken.txt", &"%#@$%#@$ %#@$\n".repeat(20))?;
    let missing = dir.join("missing.txt");

    let mock = MockProvider::working();
    let pipeline = Pipeline::new(common::test_config()).with_provider(Arc::new(mock.clone()));
    let err = pipeline
        .fuse_files(&subtitle, &[garbage, missing], "Shrek", None)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("No usable script candidates"));
    assert_eq!(mock.request_count(), 0);
    Ok(())
}

/// Test that a subtitle track with no spoken lines is rejected up front
#[tokio::test]
async fn test_fuse_files_withSilentSubtitles_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path().to_path_buf();
    let subtitle = common::create_test_file(&dir, "silent.srt", "1\n00:00:01,000 --> 00:00:02,000\n♪ Hum ♪\n")?;
    let script = common::create_test_file(&dir, "shrek.txt", &common::sample_screenplay())?;

    let pipeline = Pipeline::new(common::test_config()).with_provider(Arc::new(MockProvider::working()));
    assert!(pipeline.fuse_files(&subtitle, &[script], "Shrek", None).await.is_err());
    Ok(())
}

/// Test that fusion needs a language model
#[tokio::test]
async fn test_fuse_files_withoutProvider_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path().to_path_buf();
    let subtitle = common::create_test_subtitle(&dir, "shrek.srt")?;
    let script = common::create_test_file(&dir, "shrek.txt", &common::sample_screenplay())?;

    let err = Pipeline::new(common::test_config())
        .fuse_files(&subtitle, &[script], "Shrek", None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no language model provider"));
    Ok(())
}

/// Test the serialized shape of a fused record
#[tokio::test]
async fn test_fused_dialogue_withSerde_shouldExposeReportFields() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path().to_path_buf();
    let subtitle = common::create_test_subtitle(&dir, "shrek.srt")?;
    let script = common::create_test_file(&dir, "shrek.txt", &common::sample_screenplay())?;

    let pipeline = Pipeline::new(common::test_config()).with_provider(Arc::new(MockProvider::scripted([FUSED_RESPONSE])));
    let outcome = pipeline.fuse_files(&subtitle, &[script], "Shrek", Some(2001)).await?;

    let json: serde_json::Value = serde_json::to_value(&outcome.fused)?;
    assert_eq!(json["movie"], "Shrek");
    assert_eq!(json["year"], 2001);
    assert_eq!(json["lines"].as_array().map(Vec::len), Some(2));
    assert!(json["extraction_time"].is_string());
    assert!(json["fusion_coverage"].is_number());
    Ok(())
}
