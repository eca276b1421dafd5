/*!
 * Script/subtitle fusion.
 *
 * The chosen script supplies who speaks and the subtitle track supplies
 * what is said. Alignment is delegated to the language model because the
 * two sources are rarely line-for-line aligned. Subtitle lines are packed
 * whole into parts, each part is sent together with the whole script, and
 * the per-part results are concatenated in order. A part that stays
 * rate-limited is skipped; fusion only fails when no part got through.
 */

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use log::{info, warn};

use crate::app_config::{ChunkingConfig, Config};
use crate::document::FusedDialogue;
use crate::errors::ProviderError;
use crate::llm::backoff::BackoffPolicy;
use crate::llm::json_repair::recover_json;
use crate::llm::parser::{convert_response, ParseReport};
use crate::llm::prompts;
use crate::normalize::normalize_line;
use crate::providers::{LlmRequest, Provider};
use crate::subtitle_processor::SubtitleTrack;
use crate::validation::selection::RankedCandidate;

/// Fused output plus chunk accounting
#[derive(Debug, Clone)]
pub struct FusionOutcome {
    pub fused: FusedDialogue,
    pub report: ParseReport,
}

/// `fused / total`, capped at 1 and zero for an empty track
pub fn fusion_coverage(fused: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (fused as f64 / total as f64).min(1.0)
    }
}

/// Pack whole lines into newline-joined parts of at most `max_chars` bytes.
/// A line longer than `max_chars` gets a part of its own.
pub fn pack_lines(lines: &[String], max_chars: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    for line in lines {
        if !current.is_empty() && current.len() + 1 + line.len() > max_chars {
            parts.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

/// LLM-mediated fusion driver
pub struct Fuser {
    provider: Arc<dyn Provider>,
    chunking: ChunkingConfig,
    backoff: BackoffPolicy,
    max_tokens: u32,
    temperature: f32,
}

impl Fuser {
    pub fn new(provider: Arc<dyn Provider>, chunking: ChunkingConfig, backoff: BackoffPolicy) -> Self {
        Self {
            provider,
            chunking,
            backoff,
            max_tokens: 8192,
            temperature: 0.1,
        }
    }

    pub fn from_config(provider: Arc<dyn Provider>, config: &Config) -> Self {
        let mut fuser = Self::new(provider, config.chunking.clone(), config.backoff.clone());
        fuser.max_tokens = config.llm.max_tokens;
        fuser.temperature = config.llm.temperature;
        fuser
    }

    /// Fuse the best-ranked script with a subtitle track
    pub async fn fuse(
        &self,
        best: &RankedCandidate,
        track: &SubtitleTrack,
        movie: &str,
        year: Option<i32>,
    ) -> Result<FusionOutcome, ProviderError> {
        let started = Instant::now();
        let subtitle_lines = track.dialogue_lines();
        let total_subtitle_lines = subtitle_lines.len();
        let parts = pack_lines(&subtitle_lines, self.chunking.transcript_chunk_size.max(1));
        let total = parts.len();
        info!(
            "Fusing {} with {} subtitle lines in {} part(s)",
            best.candidate.source, total_subtitle_lines, total
        );

        let mut report = ParseReport {
            chunks_total: total,
            ..ParseReport::default()
        };
        let mut lines = Vec::new();
        let mut last_throttle = None;

        for (i, part) in parts.iter().enumerate() {
            let request = LlmRequest::new(prompts::fusion(&best.candidate.text, part, i, total))
                .system(prompts::FUSION_SYSTEM)
                .max_tokens(self.max_tokens)
                .temperature(self.temperature);
            let label = format!("fusion part {}/{}", i + 1, total);
            let response = match self.backoff.run(&label, || self.provider.complete(request.clone())).await {
                Ok(response) => response,
                Err(e @ ProviderError::RetriesExhausted { .. }) => {
                    warn!("{}: skipping part: {}", label, e);
                    report.throttled += 1;
                    last_throttle = Some(e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            match recover_json(&response) {
                Ok(recovered) => {
                    if recovered.repaired {
                        warn!("{}: salvaged truncated response", label);
                        report.repaired += 1;
                    }
                    report.succeeded += 1;
                    let chunk_lines = convert_response(&recovered.value).lines;
                    lines.extend(chunk_lines.iter().filter_map(normalize_line));
                }
                Err(e) => {
                    warn!("{}: dropping part: {}", label, e);
                    report.dropped += 1;
                }
            }
        }

        if report.succeeded == 0 {
            if let Some(e) = last_throttle {
                return Err(e);
            }
        }

        let fusion_coverage = fusion_coverage(lines.len(), total_subtitle_lines);
        info!(
            "Fused {} lines, coverage {:.1}% ({}/{})",
            lines.len(),
            fusion_coverage * 100.0,
            lines.len(),
            total_subtitle_lines
        );

        let fused = FusedDialogue {
            movie: movie.to_string(),
            year,
            subtitle_source: track.source_name(),
            script_source: best.candidate.source.clone(),
            script_overlap_score: best.result.overlap_score,
            lines,
            extraction_time: Utc::now().to_rfc3339(),
            elapsed_secs: started.elapsed().as_secs_f64(),
            total_subtitle_lines,
            fusion_coverage,
            low_confidence: best.result.low_confidence,
        };
        Ok(FusionOutcome { fused, report })
    }
}
