use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::extraction::Source;

// @module: File and directory utilities

/// Markers of MediaWiki/Fandom page markup
const WIKI_MARKERS: [&str; 3] = ["mw-parser-output", "mw-content-text", "wikia"];

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_dir()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        Ok(())
    }

    // @generates: `<output_dir>/<stem>.json`
    pub fn json_output_path<P1: AsRef<Path>, P2: AsRef<Path>>(input_file: P1, output_dir: P2) -> PathBuf {
        let stem = input_file.as_ref().file_stem().unwrap_or_default();
        output_dir
            .as_ref()
            .join(format!("{}.json", stem.to_string_lossy()))
    }

    /// Find files with a specific extension in a directory
    pub fn find_files<P: AsRef<Path>>(dir: P, extension: &str) -> Result<Vec<PathBuf>> {
        let extension = extension.trim_start_matches('.');
        let mut result = Vec::new();

        for entry in WalkDir::new(dir.as_ref()).follow_links(true) {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();
            if path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
            {
                result.push(path.to_path_buf());
            }
        }

        result.sort();
        Ok(result)
    }

    /// Every parseable source under `dir`, sorted by path
    pub fn find_sources<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(anyhow!("Not a directory: {:?}", dir));
        }

        let mut result = Vec::new();
        for entry in WalkDir::new(dir).follow_links(true) {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();
            if path.is_file() && SourceKind::from_extension(path).is_some_and(|kind| kind != SourceKind::Subtitle) {
                result.push(path.to_path_buf());
            }
        }

        result.sort();
        Ok(result)
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        fs::read_to_string(&path).with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Write a string to a file
    pub fn write_to_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            Self::ensure_dir(parent)?;
        }

        fs::write(&path, content).with_context(|| format!("Failed to write to file: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// Serialize `value` as pretty JSON into `path`
    pub fn write_json<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
        Self::write_to_file(path, &json)
    }

    /// Detect what kind of source a file holds
    pub fn detect_file_type<P: AsRef<Path>>(path: P) -> Result<SourceKind> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(anyhow!("File does not exist: {:?}", path));
        }

        let bytes = fs::read(path).with_context(|| format!("Failed to read file: {:?}", path))?;
        let sniffed = SourceKind::sniff(&bytes);
        Ok(match SourceKind::from_extension(path) {
            // a `.txt` export of an SRT file is still a subtitle track
            Some(SourceKind::Text) if sniffed == SourceKind::Subtitle => SourceKind::Subtitle,
            Some(SourceKind::Html) if sniffed == SourceKind::WikiHtml => SourceKind::WikiHtml,
            Some(kind) => kind,
            None => sniffed,
        })
    }

    /// Load a file as an extraction source
    pub fn load_source<P: AsRef<Path>>(path: P) -> Result<Source> {
        let path = path.as_ref();
        let kind = Self::detect_file_type(path)?;
        let bytes = fs::read(path).with_context(|| format!("Failed to read file: {:?}", path))?;
        let text = || String::from_utf8_lossy(&bytes).into_owned();

        match kind {
            SourceKind::Pdf => Ok(Source::Pdf(bytes.clone())),
            SourceKind::Html => Ok(Source::Html(text())),
            SourceKind::WikiHtml => Ok(Source::WikiHtml(text())),
            SourceKind::Text => Ok(Source::Text(text())),
            SourceKind::Subtitle => Err(anyhow!("{:?} is a subtitle track, not a script", path)),
        }
    }
}

/// Kind of input file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Pdf,
    Html,
    WikiHtml,
    Text,
    /// SRT subtitle track
    Subtitle,
}

impl SourceKind {
    /// Kind implied by the file extension alone
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        match ext.as_str() {
            "pdf" => Some(SourceKind::Pdf),
            "html" | "htm" => Some(SourceKind::Html),
            "txt" | "fountain" => Some(SourceKind::Text),
            "srt" => Some(SourceKind::Subtitle),
            _ => None,
        }
    }

    /// Kind guessed from the leading bytes
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(b"%PDF") {
            return SourceKind::Pdf;
        }

        let head = String::from_utf8_lossy(&bytes[..bytes.len().min(4096)]).to_lowercase();
        let trimmed = head.trim_start();
        if trimmed.starts_with("<!doctype html") || trimmed.starts_with("<html") || head.contains("<body") {
            if WIKI_MARKERS.iter().any(|m| head.contains(m)) {
                SourceKind::WikiHtml
            } else {
                SourceKind::Html
            }
        } else if head.contains("-->") && head.contains(':') {
            SourceKind::Subtitle
        } else {
            SourceKind::Text
        }
    }
}
