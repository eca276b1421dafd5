/*!
 * Tests for file utility functions
 */

use anyhow::Result;
use std::path::Path;
use scriptdle_parser::extraction::Source;
use scriptdle_parser::file_utils::{FileManager, SourceKind};
use crate::common;

/// Test that file_exists returns true for existing files
#[test]
fn test_file_exists_withExistingFile_shouldReturnTrue() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let test_file = common::create_test_file(&temp_dir.path().to_path_buf(), "script.txt", "SHREK")?;
    assert!(FileManager::file_exists(&test_file));
    assert!(!FileManager::dir_exists(&test_file));
    Ok(())
}

/// Test that file_exists returns false for non-existent files
#[test]
fn test_file_exists_withNonExistentFile_shouldReturnFalse() {
    assert!(!FileManager::file_exists("non_existent_file.tmp"));
}

/// Test that find_files matches extensions case-insensitively and recursively
#[test]
fn test_find_files_withNestedDirs_shouldFindAllMatches() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let root = temp_dir.path().to_path_buf();
    std::fs::create_dir_all(root.join("nested"))?;
    common::create_test_file(&root, "a.srt", "1")?;
    common::create_test_file(&root.join("nested"), "b.SRT", "1")?;
    common::create_test_file(&root, "c.txt", "x")?;

    let found = FileManager::find_files(&root, ".srt")?;
    assert_eq!(found.len(), 2);
    Ok(())
}

/// Test that detection prefers content over a misleading extension
#[test]
fn test_detect_file_type_withSrtSavedAsTxt_shouldBeSubtitle() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_subtitle(&temp_dir.path().to_path_buf(), "movie.txt")?;
    assert_eq!(FileManager::detect_file_type(&path)?, SourceKind::Subtitle);
    Ok(())
}

/// Test that files without a known extension are sniffed
#[test]
fn test_detect_file_type_withNoExtension_shouldSniffContent() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path().to_path_buf();
    let pdf = common::create_test_file(&dir, "download", "%PDF-1.4\n%...")?;
    let html = common::create_test_file(&dir, "page", "<html><body><pre>SHREK</pre></body></html>")?;
    assert_eq!(FileManager::detect_file_type(&pdf)?, SourceKind::Pdf);
    assert_eq!(FileManager::detect_file_type(&html)?, SourceKind::Html);
    Ok(())
}

/// Test that missing files are reported as errors
#[test]
fn test_detect_file_type_withMissingFile_shouldFail() {
    assert!(FileManager::detect_file_type("does/not/exist.pdf").is_err());
}

/// Test that a wiki page saved as .html loads as a wiki source
#[test]
fn test_load_source_withWikiHtml_shouldBeWikiSource() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(
        &temp_dir.path().to_path_buf(),
        "transcript.html",
        r#"<!DOCTYPE html><html><body><div class="mw-parser-output"><p>SHREK: Hi.</p></div></body></html>"#,
    )?;
    assert!(matches!(FileManager::load_source(&path)?, Source::WikiHtml(_)));
    Ok(())
}

/// Test that write_to_file creates missing parent directories
#[test]
fn test_write_to_file_withMissingParents_shouldCreateThem() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("a").join("b").join("out.json");
    FileManager::write_to_file(&path, "{}")?;
    assert_eq!(FileManager::read_to_string(&path)?, "{}");
    Ok(())
}

/// Test that JSON output paths replace the extension
#[test]
fn test_json_output_path_withPdf_shouldUseJsonExtension() {
    let path = FileManager::json_output_path(Path::new("/tmp/in/shrek.pdf"), Path::new("/tmp/out"));
    assert_eq!(path, Path::new("/tmp/out/shrek.json"));
}
