/*!
 * Chunked language-model dialogue parser.
 *
 * Text is split into overlapping chunks, each chunk is sent with the fixed
 * extraction contract, and the recovered JSON is merged in chunk order.
 * A chunk whose output cannot be recovered is dropped and counted. A chunk
 * still rate-limited after every retry is skipped and counted as throttled;
 * the unit only fails on it when no chunk got through. Any other provider
 * failure aborts the whole unit.
 */

use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::Value;

use crate::app_config::{ChunkingConfig, Config};
use crate::document::{DialogueLine, ScriptDocument};
use crate::errors::{AppError, ParseError, ProviderError};
use crate::extraction::pdf::split_pages;
use crate::llm::backoff::BackoffPolicy;
use crate::llm::chunking::Chunker;
use crate::llm::json_repair::recover_json;
use crate::llm::prompts;
use crate::normalize::normalize_document;
use crate::providers::{Attachment, LlmRequest, Provider};

/// Longest run of boundary lines compared when merging neighbouring chunks
const MAX_OVERLAP_LINES: usize = 20;

/// Dialogue recovered from one model response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkResponse {
    pub title: Option<String>,
    pub lines: Vec<DialogueLine>,
}

/// Per-run chunk accounting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseReport {
    pub chunks_total: usize,
    pub succeeded: usize,
    /// Succeeded only after truncation repair
    pub repaired: usize,
    /// Unrecoverable output
    pub dropped: usize,
    /// Gave up after exhausting rate-limit retries
    pub throttled: usize,
}

impl ParseReport {
    /// Whether any chunk was lost
    pub fn is_degraded(&self) -> bool {
        self.dropped + self.throttled > 0
    }
}

/// A parsed document plus the accounting that produced it
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub document: ScriptDocument,
    pub report: ParseReport,
}

/// First string field present among `keys`
fn string_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| value.get(*k).and_then(Value::as_str))
}

fn convert_lines(items: &[Value], out: &mut Vec<DialogueLine>) {
    for item in items {
        let character = string_field(item, &["character", "speaker", "name"]);
        let text = string_field(item, &["text", "content", "dialogue", "line"]);
        if let (Some(character), Some(text)) = (character, text) {
            if let Some(line) = DialogueLine::new(character, text) {
                out.push(line);
            }
        }
    }
}

/// Read a response object in either the flat `lines` shape or the nested
/// `scenes[].dialogue` shape
pub fn convert_response(value: &Value) -> ChunkResponse {
    let title = string_field(value, &["title"])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    let mut lines = Vec::new();
    if let Some(items) = value.get("lines").and_then(Value::as_array) {
        convert_lines(items, &mut lines);
    } else if let Some(scenes) = value.get("scenes").and_then(Value::as_array) {
        for scene in scenes {
            if let Some(items) = scene.get("dialogue").and_then(Value::as_array) {
                convert_lines(items, &mut lines);
            }
        }
    } else if let Some(items) = value.as_array() {
        convert_lines(items, &mut lines);
    }

    ChunkResponse { title, lines }
}

/// Append `next` to `merged`, skipping lines repeated from the chunk overlap
fn merge_lines(merged: &mut Vec<DialogueLine>, next: Vec<DialogueLine>) {
    let limit = merged.len().min(next.len()).min(MAX_OVERLAP_LINES);
    let repeated = (1..=limit)
        .rev()
        .find(|&k| merged[merged.len() - k..] == next[..k])
        .unwrap_or(0);
    merged.extend(next.into_iter().skip(repeated));
}

/// Which prompt family to use for text input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMode {
    Screenplay,
    Transcript,
}

/// Drives a provider chunk by chunk and merges the results
pub struct ChunkedLlmParser {
    provider: Arc<dyn Provider>,
    chunking: ChunkingConfig,
    backoff: BackoffPolicy,
    max_tokens: u32,
    temperature: f32,
}

impl ChunkedLlmParser {
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
        Self::new(provider, config.chunking.clone(), config.backoff.clone())
            .with_generation(config.llm.max_tokens, config.llm.temperature)
    }

    /// Override output budget and temperature
    pub fn with_generation(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Whether whole-PDF parsing is available with this provider
    pub fn accepts_pdf(&self) -> bool {
        self.provider.supports_attachments()
    }

    /// Parse screenplay text
    pub async fn parse(&self, text: &str, title: &str, year: Option<i32>) -> Result<ParseOutcome, ProviderError> {
        self.parse_text(text, TextMode::Screenplay, title, year).await
    }

    /// Parse a free-form `NAME: line` transcript
    pub async fn parse_transcript(
        &self,
        text: &str,
        title: &str,
        year: Option<i32>,
    ) -> Result<ParseOutcome, ProviderError> {
        self.parse_text(text, TextMode::Transcript, title, year).await
    }

    /// Parse text in the given mode. `title` is used when no chunk reports one.
    pub async fn parse_text(
        &self,
        text: &str,
        mode: TextMode,
        title: &str,
        year: Option<i32>,
    ) -> Result<ParseOutcome, ProviderError> {
        let size = match mode {
            TextMode::Screenplay => self.chunking.chunk_size,
            TextMode::Transcript => self.chunking.transcript_chunk_size,
        };
        let chunks = Chunker::new(size, self.chunking.overlap, self.chunking.lookback).split(text);
        let total = chunks.len();
        info!("Parsing {} chars in {} chunk(s) with {}", text.len(), total, self.provider.name());

        let requests = chunks.iter().enumerate().map(|(i, chunk)| {
            let prompt = match mode {
                TextMode::Transcript => prompts::transcript_chunk(&chunk.text),
                TextMode::Screenplay if i == 0 => prompts::first_chunk(&chunk.text),
                TextMode::Screenplay => prompts::continuation_chunk(&chunk.text, i, total),
            };
            self.request(prompt)
        });
        self.run(requests.collect(), title, year).await
    }

    /// Send a PDF to an attachment-capable provider in page windows
    pub async fn parse_pdf(
        &self,
        bytes: &[u8],
        title: &str,
        year: Option<i32>,
    ) -> Result<ParseOutcome, AppError> {
        if !self.provider.supports_attachments() {
            return Err(ProviderError::Unsupported(format!(
                "{} cannot read PDF attachments",
                self.provider.name()
            ))
            .into());
        }

        let pages_per_chunk = self.chunking.pages_per_chunk.max(1);
        let parts = split_pages(bytes, pages_per_chunk)?;
        info!("Sending PDF to {} in {} part(s)", self.provider.name(), parts.len());
        let requests = parts
            .into_iter()
            .enumerate()
            .map(|(i, part)| {
                self.request(prompts::document_part(i, i * pages_per_chunk + 1))
                    .attachment(Attachment::pdf(part))
            })
            .collect();
        Ok(self.run(requests, title, year).await?)
    }

    fn request(&self, prompt: String) -> LlmRequest {
        LlmRequest::new(prompt)
            .system(prompts::EXTRACTION_SYSTEM)
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
    }

    /// Send requests one at a time and merge what comes back
    async fn run(&self, requests: Vec<LlmRequest>, title: &str, year: Option<i32>) -> Result<ParseOutcome, ProviderError> {
        let mut report = ParseReport {
            chunks_total: requests.len(),
            ..ParseReport::default()
        };
        let mut detected_title: Option<String> = None;
        let mut lines = Vec::new();
        let mut last_throttle = None;

        for (i, request) in requests.into_iter().enumerate() {
            let label = format!("chunk {}/{}", i + 1, report.chunks_total);
            let response = match self.backoff.run(&label, || self.provider.complete(request.clone())).await {
                Ok(response) => response,
                Err(e @ ProviderError::RetriesExhausted { .. }) => {
                    warn!("{}: skipping chunk: {}", label, e);
                    report.throttled += 1;
                    last_throttle = Some(e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            match self.interpret(&response) {
                Ok((chunk, repaired)) => {
                    debug!("{}: {} lines{}", label, chunk.lines.len(), if repaired { " (repaired)" } else { "" });
                    report.succeeded += 1;
                    if repaired {
                        report.repaired += 1;
                    }
                    if detected_title.is_none() {
                        detected_title = chunk.title;
                    }
                    merge_lines(&mut lines, chunk.lines);
                }
                Err(e) => {
                    warn!("{}: dropping chunk: {}", label, e);
                    report.dropped += 1;
                }
            }
        }

        if report.succeeded == 0 {
            if let Some(e) = last_throttle {
                return Err(e);
            }
        }
        if report.is_degraded() {
            warn!(
                "{} of {} chunks lost ({} dropped, {} throttled); output is incomplete",
                report.dropped + report.throttled,
                report.chunks_total,
                report.dropped,
                report.throttled
            );
        }

        let title = if title.trim().is_empty() {
            detected_title.unwrap_or_default()
        } else {
            title.to_string()
        };
        let document = normalize_document(&ScriptDocument::titled(title, year, lines));
        Ok(ParseOutcome { document, report })
    }

    fn interpret(&self, response: &str) -> Result<(ChunkResponse, bool), ParseError> {
        let recovered = recover_json(response)?;
        Ok((convert_response(&recovered.value), recovered.repaired))
    }
}
