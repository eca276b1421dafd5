/*!
 * Integration tests for directory batch runs
 */

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use scriptdle_parser::file_utils::FileManager;
use scriptdle_parser::pipeline::{BatchSummary, ParseOptions, Pipeline, UnitOutcome};
use scriptdle_parser::providers::mock::MockProvider;
use crate::common;

/// Test that a mixed directory reports each unit on its own
#[tokio::test]
async fn test_run_batch_withMixedDirectory_shouldReportPerUnit() -> Result<()> {
    common::init_logger();
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path().to_path_buf();
    common::create_test_file(&dir, "a_shrek.txt", &common::sample_screenplay())?;
    common::create_test_file(&dir, "b_prose.txt", &"The wind blows across the moor.\n".repeat(5))?;
    common::create_test_file(&dir, "c_broken.txt", &"%#@$%#@$ %#@$\n".repeat(20))?;
    common::create_test_subtitle(&dir, "shrek.srt")?;
    common::create_test_file(&dir, "notes.docx", "ignored")?;

    let sources = FileManager::find_sources(&dir)?;
    assert_eq!(sources.len(), 3);

    let pipeline = Pipeline::new(common::test_config());
    let reports = pipeline.run_batch(&sources, &ParseOptions::default(), |_, _| {}).await;

    let statuses: Vec<&str> = reports.iter().map(|r| r.outcome.status()).collect();
    assert_eq!(statuses, vec!["success", "degraded", "failed"]);
    assert!(reports[0].label.ends_with("a_shrek.txt"));
    assert_eq!(reports[0].outcome.document().map(|d| d.lines().len()), Some(3));
    assert!(reports[1].to_string().starts_with("[degraded]"));
    assert!(reports[2].outcome.document().is_none());

    assert_eq!(
        BatchSummary::from_reports(&reports),
        BatchSummary {
            succeeded: 1,
            degraded: 1,
            failed: 1
        }
    );
    Ok(())
}

/// Test that results keep input order whatever the completion order
#[tokio::test]
async fn test_run_batch_withManyFiles_shouldKeepInputOrder() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path().to_path_buf();
    let mut paths = Vec::new();
    for i in 0..12 {
        paths.push(common::create_test_file(&dir, &format!("script_{:02}.txt", i), &common::sample_screenplay())?);
    }

    let mut config = common::test_config();
    config.batch.concurrency = 3;
    let reports = Pipeline::new(config).run_batch(&paths, &ParseOptions::default(), |_, _| {}).await;

    assert_eq!(reports.len(), 12);
    for (path, report) in paths.iter().zip(&reports) {
        assert_eq!(report.label, path.display().to_string());
        assert_eq!(report.outcome.status(), "success");
    }
    Ok(())
}

/// Test that progress is reported once per unit with the right total
#[tokio::test]
async fn test_run_batch_withProgressCallback_shouldCountEveryUnit() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path().to_path_buf();
    let paths = vec![
        common::create_test_file(&dir, "one.txt", &common::sample_screenplay())?,
        common::create_test_file(&dir, "two.txt", &common::sample_screenplay())?,
        dir.join("three_missing.txt"),
    ];

    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();
    Pipeline::new(common::test_config())
        .run_batch(&paths, &ParseOptions::default(), move |done, total| {
            if let Ok(mut seen) = recorder.lock() {
                seen.push((done, total));
            }
        })
        .await;

    let mut seen = seen.lock().map(|s| s.clone()).unwrap_or_default();
    seen.sort();
    assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
    Ok(())
}

/// Test that one failing model unit does not stop the others
#[tokio::test]
async fn test_run_batch_withIntermittentProvider_shouldIsolateFailures() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path().to_path_buf();
    let paths: Vec<_> = (0..4)
        .map(|i| common::create_test_file(&dir, &format!("unit_{}.txt", i), &common::sample_screenplay()))
        .collect::<Result<_>>()?;

    let mut config = common::test_config();
    config.batch.concurrency = 1;
    let mock = MockProvider::intermittent(2);
    let pipeline = Pipeline::new(config).with_provider(Arc::new(mock.clone()));
    let options = ParseOptions {
        use_llm: true,
        ..ParseOptions::default()
    };
    let reports = pipeline.run_batch(&paths, &options, |_, _| {}).await;

    let failed = reports
        .iter()
        .filter(|r| matches!(r.outcome, UnitOutcome::Failed(_)))
        .count();
    assert_eq!(failed, 2);
    assert_eq!(mock.request_count(), 4);
    assert_eq!(BatchSummary::from_reports(&reports).succeeded, 2);
    Ok(())
}

/// Test that an empty batch is not an error
#[test]
fn test_run_batch_withNoPaths_shouldReturnNothing() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let pipeline = Pipeline::new(common::test_config());
    let reports = tokio_test::block_on(pipeline.run_batch(&[], &ParseOptions::default(), move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    assert!(reports.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
