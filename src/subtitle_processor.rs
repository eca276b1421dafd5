use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

// @module: SRT parsing and subtitle dialogue extraction

// @const: SRT timestamp line
static TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{2}):(\d{2}):(\d{2})[,.](\d{3})\s*-->\s*(\d{2}):(\d{2}):(\d{2})[,.](\d{3})").unwrap()
});

// @const: Inline markup such as <i> or <font color=...>
static TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

// @const: Leading speaker label ("JOHN:")
static SPEAKER_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][A-Z\s]+:\s*").unwrap());

// @const: Prefixes of non-dialogue subtitle lines (music, sound, markup)
const NON_DIALOGUE_PREFIXES: [char; 4] = ['♪', '[', '(', '<'];

// @struct: Single subtitle entry
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleEntry {
    // @field: Sequence number
    pub seq_num: usize,

    // @field: Start time in ms
    pub start_time_ms: u64,

    // @field: End time in ms
    pub end_time_ms: u64,

    // @field: Subtitle text, possibly several lines
    pub text: String,
}

impl SubtitleEntry {
    // @creates: Validated subtitle entry
    // @validates: Time range and non-empty text
    pub fn new_validated(seq_num: usize, start_time_ms: u64, end_time_ms: u64, text: &str) -> Result<Self> {
        if end_time_ms < start_time_ms {
            return Err(anyhow!(
                "Invalid time range: end time {} < start time {}",
                end_time_ms,
                start_time_ms
            ));
        }

        let trimmed_text = text.trim();
        if trimmed_text.is_empty() {
            return Err(anyhow!("Empty subtitle text for entry {}", seq_num));
        }

        Ok(SubtitleEntry {
            seq_num,
            start_time_ms,
            end_time_ms,
            text: trimmed_text.to_string(),
        })
    }

    /// Format a timestamp in milliseconds to SRT format (HH:MM:SS,mmm)
    pub fn format_timestamp(ms: u64) -> String {
        let hours = ms / 3_600_000;
        let minutes = (ms % 3_600_000) / 60_000;
        let seconds = (ms % 60_000) / 1_000;
        let millis = ms % 1_000;

        format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
    }

    /// Spoken lines of this entry, with markup and speaker labels removed
    pub fn dialogue_lines(&self) -> impl Iterator<Item = String> + '_ {
        self.text.lines().filter_map(clean_dialogue_line)
    }
}

impl fmt::Display for SubtitleEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.seq_num)?;
        writeln!(
            f,
            "{} --> {}",
            Self::format_timestamp(self.start_time_ms),
            Self::format_timestamp(self.end_time_ms)
        )?;
        writeln!(f, "{}", self.text)?;
        writeln!(f)
    }
}

/// Clean one subtitle text line, or `None` if it is not spoken dialogue
pub fn clean_dialogue_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(NON_DIALOGUE_PREFIXES) {
        return None;
    }
    if line.chars().all(|c| c.is_ascii_digit()) || line.contains("-->") {
        return None;
    }

    let untagged = TAG_REGEX.replace_all(line, "");
    let unlabelled = SPEAKER_LABEL.replace(&untagged, "");
    let cleaned = unlabelled.trim();
    (cleaned.chars().count() > 2).then(|| cleaned.to_string())
}

/// Close the pending entry, if it has timing
fn push_entry(entries: &mut Vec<SubtitleEntry>, seq: Option<usize>, times: Option<(u64, u64)>, text: &mut String) {
    if let (Some(seq), Some((start, end))) = (seq, times) {
        match SubtitleEntry::new_validated(seq, start, end, text) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!("Skipping invalid subtitle entry {}: {}", seq, e),
        }
    }
    text.clear();
}

fn timestamp_to_ms(caps: &regex::Captures, first_group: usize) -> Result<u64> {
    let part = |offset: usize| -> Result<u64> {
        caps.get(first_group + offset)
            .ok_or_else(|| anyhow!("Missing timestamp component"))?
            .as_str()
            .parse::<u64>()
            .context("Invalid timestamp component")
    };
    let (hours, minutes, seconds, millis) = (part(0)?, part(1)?, part(2)?, part(3)?);
    if minutes >= 60 || seconds >= 60 {
        return Err(anyhow!("Invalid time components"));
    }
    Ok(hours * 3_600_000 + minutes * 60_000 + seconds * 1_000 + millis)
}

/// A parsed subtitle track
#[derive(Debug, Clone)]
pub struct SubtitleTrack {
    /// Source filename, empty for in-memory tracks
    pub source_file: PathBuf,

    /// List of subtitle entries
    pub entries: Vec<SubtitleEntry>,
}

impl SubtitleTrack {
    /// Read and parse an SRT file. Invalid UTF-8 is replaced, not rejected.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("Failed to read subtitle file: {:?}", path))?;
        let content = String::from_utf8_lossy(&bytes);
        let entries = Self::parse_srt_string(&content)?;
        debug!("Parsed {} subtitle entries from {:?}", entries.len(), path);
        Ok(Self {
            source_file: path.to_path_buf(),
            entries,
        })
    }

    /// Parse SRT content held in memory
    pub fn from_srt(content: &str) -> Result<Self> {
        Ok(Self {
            source_file: PathBuf::new(),
            entries: Self::parse_srt_string(content)?,
        })
    }

    /// Parse SRT entries. Malformed entries are skipped with a warning.
    pub fn parse_srt_string(content: &str) -> Result<Vec<SubtitleEntry>> {
        let mut entries = Vec::new();
        let mut seq_num: Option<usize> = None;
        let mut times: Option<(u64, u64)> = None;
        let mut text = String::new();

        for (line_number, line) in content.lines().enumerate() {
            let trimmed = line.trim().trim_start_matches('\u{feff}');

            if trimmed.is_empty() {
                if times.is_some() && !text.is_empty() {
                    push_entry(&mut entries, seq_num.take(), times.take(), &mut text);
                }
                continue;
            }

            if times.is_none() {
                if let Some(caps) = TIMESTAMP_REGEX.captures(trimmed) {
                    match (timestamp_to_ms(&caps, 1), timestamp_to_ms(&caps, 5)) {
                        (Ok(start), Ok(end)) => {
                            times = Some((start, end));
                            // tolerate a missing sequence number
                            seq_num.get_or_insert(entries.len() + 1);
                            continue;
                        }
                        _ => warn!("Invalid timestamp format at line {}: {}", line_number + 1, trimmed),
                    }
                }
                if seq_num.is_none() {
                    if let Ok(num) = trimmed.parse::<usize>() {
                        seq_num = Some(num);
                        continue;
                    }
                }
                warn!("Unexpected text at line {} before timestamp: {}", line_number + 1, trimmed);
                continue;
            }

            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(trimmed);
        }
        push_entry(&mut entries, seq_num, times, &mut text);

        if entries.is_empty() && !content.trim().is_empty() {
            return Err(anyhow!("No valid subtitle entries found"));
        }
        Ok(entries)
    }

    /// Spoken lines across the whole track, in order
    pub fn dialogue_lines(&self) -> Vec<String> {
        self.entries.iter().flat_map(|e| e.dialogue_lines()).collect()
    }

    /// Dialogue lines joined one per line, for prompts
    pub fn dialogue_text(&self) -> String {
        self.dialogue_lines().join("\n")
    }

    /// Display name of the source
    pub fn source_name(&self) -> String {
        self.source_file.display().to_string()
    }
}
