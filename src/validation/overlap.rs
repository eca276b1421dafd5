/*!
 * Script/subtitle overlap scoring.
 *
 * A subtitle line counts as found when a contiguous run of its words, at
 * least `min_match_ratio` of the line and never fewer than
 * `min_match_words`, appears verbatim in the normalized script.
 */

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::app_config::ValidationConfig;
use crate::document::{SampleMatch, ValidationResult};

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s']").unwrap());

/// Context kept on either side of a match
const CONTEXT_CHARS: usize = 20;
/// Subtitle text kept per sample match
const SAMPLE_LINE_CHARS: usize = 80;

/// Lowercase, replace punctuation other than apostrophes with spaces and
/// collapse whitespace
pub fn normalize_for_comparison(text: &str) -> String {
    let lower = text.to_lowercase();
    NON_WORD
        .replace_all(&lower, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Evenly spaced sample of `lines` when there are many of them
pub fn sample_lines(lines: &[String], sample_size: usize) -> Vec<&String> {
    let sample_size = sample_size.max(1);
    if lines.len() > sample_size * 3 {
        let step = lines.len() / sample_size;
        lines.iter().step_by(step).take(sample_size).collect()
    } else {
        lines.iter().collect()
    }
}

fn floor_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

/// Scores candidate scripts against subtitle dialogue
#[derive(Debug, Clone)]
pub struct OverlapValidator {
    config: ValidationConfig,
}

impl OverlapValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Words needed in sequence for a line of `word_count` words
    pub fn window_len(&self, word_count: usize) -> usize {
        let proportional = (word_count as f64 * self.config.min_match_ratio).floor() as usize;
        proportional.max(self.config.min_match_words).max(1)
    }

    /// Byte offset in `haystack` (space padded) of the first window of
    /// `words` found there, with the matched phrase
    fn find_window(&self, haystack: &str, words: &[&str]) -> Option<(usize, String)> {
        let window = self.window_len(words.len());
        if words.len() < window {
            return None;
        }
        words.windows(window).find_map(|w| {
            let phrase = w.join(" ");
            haystack
                .find(&format!(" {} ", phrase))
                .map(|pos| (pos, phrase))
        })
    }

    /// Score `script_text` against `subtitle_lines`
    pub fn validate(&self, script_text: &str, subtitle_lines: &[String]) -> ValidationResult {
        let normalized = normalize_for_comparison(script_text);
        let haystack = format!(" {} ", normalized);

        let mut matched_lines = 0;
        let mut total_checked = 0;
        let mut sample_matches = Vec::new();

        for line in sample_lines(subtitle_lines, self.config.sample_size) {
            let line_normalized = normalize_for_comparison(line);
            if line_normalized.len() < self.config.min_normalized_len {
                continue;
            }
            let words: Vec<&str> = line_normalized.split(' ').collect();
            if words.len() < self.config.min_line_words {
                continue;
            }
            total_checked += 1;

            let Some((pos, phrase)) = self.find_window(&haystack, &words) else {
                continue;
            };
            matched_lines += 1;

            if sample_matches.len() < self.config.max_sample_matches {
                // `pos` is the pad space, so it is also the phrase offset in `normalized`
                let start = pos;
                let end = start + phrase.len();
                let from = floor_boundary(&normalized, start.saturating_sub(CONTEXT_CHARS));
                let to = ceil_boundary(&normalized, end + CONTEXT_CHARS);
                sample_matches.push(SampleMatch {
                    subtitle_line: line.chars().take(SAMPLE_LINE_CHARS).collect(),
                    script_context: format!("...{}...", &normalized[from..to]),
                });
            }
        }

        let overlap_score = if total_checked > 0 {
            matched_lines as f64 / total_checked as f64
        } else {
            0.0
        };
        debug!("Overlap {}/{} = {:.3}", matched_lines, total_checked, overlap_score);

        ValidationResult {
            overlap_score,
            matched_lines,
            total_checked,
            sample_matches,
            low_confidence: overlap_score < self.config.min_confidence,
        }
    }
}

/// Score with an explicit configuration
pub fn validate(script_text: &str, subtitle_lines: &[String], config: &ValidationConfig) -> ValidationResult {
    OverlapValidator::new(config.clone()).validate(script_text, subtitle_lines)
}
