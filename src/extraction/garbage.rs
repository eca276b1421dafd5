/*!
 * Garbage-text detection for extracted output.
 *
 * Broken font encodings and failed OCR produce text that looks plausible by
 * length alone. The detector samples a prefix of the output and rejects it
 * when too many lines are mostly symbols or digits.
 */

use once_cell::sync::Lazy;
use regex::Regex;

use crate::app_config::ExtractionConfig;
use crate::errors::ExtractionError;

static SYMBOL_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\W\d_\s]{3,}$").unwrap());

/// Samples extracted text and decides whether it is usable
#[derive(Debug, Clone)]
pub struct GarbageDetector {
    sample_lines: usize,
    sample_chars: usize,
    min_alpha_ratio: f64,
    threshold: f64,
}

impl GarbageDetector {
    pub fn new(sample_lines: usize, sample_chars: usize, min_alpha_ratio: f64, threshold: f64) -> Self {
        Self {
            sample_lines,
            sample_chars,
            min_alpha_ratio,
            threshold,
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(
            config.garbage_sample_lines,
            config.garbage_sample_chars,
            config.min_alpha_ratio,
            config.garbage_ratio_threshold,
        )
    }

    /// Whether a single trimmed line is mostly non-alphabetic
    pub fn is_garbage_line(&self, line: &str) -> bool {
        let line = line.trim();
        let total = line.chars().count();
        if total > 3 {
            let alpha = line.chars().filter(|c| c.is_alphabetic()).count();
            if (alpha as f64) / (total as f64) < self.min_alpha_ratio {
                return true;
            }
        }
        SYMBOL_LINE.is_match(line)
    }

    /// Fraction of sampled non-blank lines that are garbage.
    /// A sample with no lines at all counts as entirely garbage.
    pub fn garbage_ratio(&self, text: &str) -> f64 {
        let end = text
            .char_indices()
            .nth(self.sample_chars)
            .map(|(i, _)| i)
            .unwrap_or(text.len());
        let sampled: Vec<&str> = text[..end]
            .lines()
            .filter(|l| !l.trim().is_empty())
            .take(self.sample_lines)
            .collect();
        if sampled.is_empty() {
            return 1.0;
        }
        let garbage = sampled.iter().filter(|l| self.is_garbage_line(l)).count();
        garbage as f64 / sampled.len() as f64
    }

    /// Fail with `ExtractionError::Garbage` above the configured ratio
    pub fn check(&self, text: &str) -> Result<(), ExtractionError> {
        let ratio = self.garbage_ratio(text);
        if ratio > self.threshold {
            return Err(ExtractionError::Garbage { ratio });
        }
        Ok(())
    }
}

impl Default for GarbageDetector {
    fn default() -> Self {
        Self::from_config(&ExtractionConfig::default())
    }
}
