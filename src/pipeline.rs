/*!
 * End-to-end parsing pipeline.
 *
 * A unit of work is one source (file or URL) turned into one
 * `ScriptDocument`. Units are independent: a batch runs them with bounded
 * concurrency and reports each one as a success, a degraded success
 * (fallback extraction, dropped chunks, no dialogue) or a failure, instead
 * of a single pass/fail for the whole run.
 */

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context};
use futures::stream::{self, StreamExt};
use log::{debug, error, info, warn};
use tokio::sync::Semaphore;

use crate::app_config::Config;
use crate::document::ScriptDocument;
use crate::errors::{AppError, ProviderError};
use crate::extraction::{ExtractorChain, PageFetcher, Source};
use crate::file_utils::FileManager;
use crate::llm::parser::{ChunkedLlmParser, ParseOutcome, TextMode};
use crate::parser::{HeuristicParser, SourceFamily};
use crate::providers::Provider;
use crate::subtitle_processor::SubtitleTrack;
use crate::validation::fusion::{Fuser, FusionOutcome};
use crate::validation::selection::{select_best, ScriptCandidate};

/// Per-unit parse options
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Output id; defaults to the slug of the title
    pub id: Option<String>,
    /// Title; defaults to the model-detected title, then the file stem
    pub title: Option<String>,
    pub year: Option<i32>,
    /// Use the language-model parser instead of the heuristic one
    pub use_llm: bool,
    /// Force a heuristic parser family
    pub family: Option<SourceFamily>,
}

/// A parsed document plus the reasons it is degraded, if any
#[derive(Debug, Clone)]
pub struct Parsed {
    pub document: ScriptDocument,
    pub warnings: Vec<String>,
}

/// Result of one unit of work
#[derive(Debug)]
pub enum UnitOutcome {
    Success(ScriptDocument),
    Degraded { document: ScriptDocument, reasons: Vec<String> },
    Failed(String),
}

impl UnitOutcome {
    pub fn document(&self) -> Option<&ScriptDocument> {
        match self {
            UnitOutcome::Success(document) | UnitOutcome::Degraded { document, .. } => Some(document),
            UnitOutcome::Failed(_) => None,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            UnitOutcome::Success(_) => "success",
            UnitOutcome::Degraded { .. } => "degraded",
            UnitOutcome::Failed(_) => "failed",
        }
    }
}

impl From<Result<Parsed, AppError>> for UnitOutcome {
    fn from(result: Result<Parsed, AppError>) -> Self {
        match result {
            Ok(parsed) if parsed.warnings.is_empty() => UnitOutcome::Success(parsed.document),
            Ok(parsed) => UnitOutcome::Degraded {
                document: parsed.document,
                reasons: parsed.warnings,
            },
            Err(e) => UnitOutcome::Failed(e.to_string()),
        }
    }
}

/// Outcome of one unit, labelled with its input
#[derive(Debug)]
pub struct UnitReport {
    pub label: String,
    pub outcome: UnitOutcome,
}

impl fmt::Display for UnitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            UnitOutcome::Success(doc) => write!(
                f,
                "[success] {}: {} lines, {} characters",
                self.label,
                doc.lines().len(),
                doc.characters().len()
            ),
            UnitOutcome::Degraded { document, reasons } => write!(
                f,
                "[degraded] {}: {} lines ({})",
                self.label,
                document.lines().len(),
                reasons.join("; ")
            ),
            UnitOutcome::Failed(reason) => write!(f, "[failed] {}: {}", self.label, reason),
        }
    }
}

/// Totals over a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub degraded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_reports(reports: &[UnitReport]) -> Self {
        reports.iter().fold(Self::default(), |mut summary, report| {
            match report.outcome {
                UnitOutcome::Success(_) => summary.succeeded += 1,
                UnitOutcome::Degraded { .. } => summary.degraded += 1,
                UnitOutcome::Failed(_) => summary.failed += 1,
            }
            summary
        })
    }
}

/// Extraction, parsing and fusion wired together from one `Config`
pub struct Pipeline {
    config: Config,
    provider: Option<Arc<dyn Provider>>,
}

impl Pipeline {
    /// Heuristic-only pipeline
    pub fn new(config: Config) -> Self {
        Self { config, provider: None }
    }

    /// Pipeline with a language model for `use_llm` parsing and fusion
    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn provider(&self) -> Result<Arc<dyn Provider>, ProviderError> {
        self.provider
            .clone()
            .ok_or_else(|| ProviderError::Unsupported("no language model provider configured".to_string()))
    }

    fn llm_parser(&self) -> Result<ChunkedLlmParser, ProviderError> {
        Ok(ChunkedLlmParser::from_config(self.provider()?, &self.config))
    }

    /// Parse one source. `fallback_title` is used when neither the options
    /// nor the model supply a title.
    pub async fn parse_source(
        &self,
        source: Source,
        options: &ParseOptions,
        fallback_title: &str,
    ) -> Result<Parsed, AppError> {
        let mut warnings = Vec::new();

        let document = if options.use_llm {
            let parser = self.llm_parser()?;
            // empty lets the model-detected title through
            let llm_title = options.title.clone().unwrap_or_default();
            let outcome = match &source {
                Source::Pdf(bytes) if parser.accepts_pdf() => {
                    info!("Sending whole PDF to {}", parser.provider_name());
                    parser.parse_pdf(bytes, &llm_title, options.year).await?
                }
                _ => {
                    let extraction = ExtractorChain::for_llm(&source, &self.config.extraction)
                        .extract(&source)
                        .await?;
                    if extraction.is_degraded() {
                        warnings.push(format!("extracted with fallback {}", extraction.strategy));
                    }
                    let mode = match extraction.family {
                        SourceFamily::Transcript => TextMode::Transcript,
                        _ => TextMode::Screenplay,
                    };
                    parser
                        .parse_text(&extraction.content.to_text(), mode, &llm_title, options.year)
                        .await?
                }
            };
            let ParseOutcome { document, report } = outcome;
            if report.dropped > 0 {
                warnings.push(format!("{} of {} chunks dropped", report.dropped, report.chunks_total));
            }
            if report.throttled > 0 {
                warnings.push(format!("{} of {} chunks rate-limited", report.throttled, report.chunks_total));
            }
            document
        } else {
            let extraction = ExtractorChain::for_source(&source, &self.config.extraction)
                .extract(&source)
                .await?;
            if extraction.is_degraded() {
                warnings.push(format!("extracted with fallback {}", extraction.strategy));
            }
            let family = options.family.unwrap_or(extraction.family);
            debug!("Parsing {} output as {}", extraction.strategy, family);
            let title = options.title.as_deref().unwrap_or(fallback_title);
            HeuristicParser::for_family(family, &self.config.parser).parse_document(
                extraction.content,
                title,
                options.year,
            )
        };

        let mut document = document.with_metadata(options.id.clone(), options.title.clone(), options.year);
        if document.title().is_empty() {
            document = document.with_metadata(options.id.clone(), Some(fallback_title.to_string()), None);
        }
        if document.is_empty() {
            warnings.push("no dialogue found".to_string());
        }
        for warning in &warnings {
            warn!("{}: {}", document.title(), warning);
        }
        Ok(Parsed { document, warnings })
    }

    /// Parse a local file; the title falls back to the file stem
    pub async fn parse_file(&self, path: &Path, options: &ParseOptions) -> Result<Parsed, AppError> {
        let source = FileManager::load_source(path)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().replace(['_', '-'], " "))
            .unwrap_or_default();
        self.parse_source(source, options, &stem).await
    }

    /// Fetch and parse a web page; the title falls back to the last path segment
    pub async fn parse_url(&self, url: &str, options: &ParseOptions) -> Result<Parsed, AppError> {
        let fetcher = PageFetcher::new(self.config.fetch.clone());
        let page = fetcher.fetch(url).await?;
        let fallback = page
            .url
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(|s| s.replace(['_', '-'], " ")))
            .unwrap_or_default();
        let source = Source::from_page(page, &self.config.fetch);
        self.parse_source(source, options, &fallback).await
    }

    /// Parse every file with bounded concurrency, reporting each in input order.
    /// `progress_callback` receives `(done, total)` as units finish.
    pub async fn run_batch(
        &self,
        paths: &[PathBuf],
        options: &ParseOptions,
        progress_callback: impl Fn(usize, usize) + Clone + Send,
    ) -> Vec<UnitReport> {
        let concurrency = self.config.batch.concurrency.max(1);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let total = paths.len();
        let processed = Arc::new(AtomicUsize::new(0));
        info!("Parsing {} source(s), {} at a time", total, concurrency);

        let mut results = stream::iter(paths.iter().enumerate())
            .map(|(index, path)| {
                let semaphore = semaphore.clone();
                let processed = processed.clone();
                let progress_callback = progress_callback.clone();

                async move {
                    let started = Instant::now();
                    let outcome = match semaphore.acquire().await {
                        Ok(_permit) => UnitOutcome::from(self.parse_file(path, options).await),
                        Err(e) => UnitOutcome::Failed(e.to_string()),
                    };

                    let current = processed.fetch_add(1, Ordering::SeqCst) + 1;
                    progress_callback(current, total);
                    match &outcome {
                        UnitOutcome::Failed(reason) => error!("{:?} failed: {}", path, reason),
                        _ => debug!("{:?} finished in {:?}", path, started.elapsed()),
                    }

                    let report = UnitReport {
                        label: path.display().to_string(),
                        outcome,
                    };
                    (index, report)
                }
            })
            .buffer_unordered(concurrency)
            .collect::<Vec<_>>()
            .await;

        results.sort_by_key(|(index, _)| *index);
        let reports: Vec<UnitReport> = results.into_iter().map(|(_, report)| report).collect();

        let summary = BatchSummary::from_reports(&reports);
        info!(
            "Batch finished: {} succeeded, {} degraded, {} failed",
            summary.succeeded, summary.degraded, summary.failed
        );
        reports
    }

    /// Flat text of a candidate script file
    async fn candidate_text(&self, path: &Path) -> anyhow::Result<String> {
        let source = FileManager::load_source(path)?;
        let extraction = ExtractorChain::for_source(&source, &self.config.extraction)
            .extract(&source)
            .await
            .with_context(|| format!("No usable text in {:?}", path))?;
        Ok(extraction.content.to_text())
    }

    /// Rank candidate scripts against a subtitle track and fuse the best one
    pub async fn fuse_files(
        &self,
        subtitle_path: &Path,
        script_paths: &[PathBuf],
        movie: &str,
        year: Option<i32>,
    ) -> anyhow::Result<FusionOutcome> {
        let track = SubtitleTrack::from_file(subtitle_path)?;
        let subtitle_lines = track.dialogue_lines();
        if subtitle_lines.is_empty() {
            return Err(anyhow!("No dialogue lines in {:?}", subtitle_path));
        }

        let mut candidates = Vec::new();
        for path in script_paths {
            match self.candidate_text(path).await {
                Ok(text) => candidates.push(ScriptCandidate::new(path.display().to_string(), text)),
                Err(e) => warn!("Skipping candidate {:?}: {:#}", path, e),
            }
        }

        let best = select_best(candidates, &subtitle_lines, &self.config.validation)
            .ok_or_else(|| anyhow!("No usable script candidates for {}", movie))?;
        let fuser = Fuser::from_config(self.provider()?, &self.config);
        Ok(fuser.fuse(&best, &track, movie, year).await?)
    }
}
