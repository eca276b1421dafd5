/*!
 * # scriptdle-parser
 *
 * Turns movie screenplays and transcripts into a canonical dialogue record:
 * `{ id, title, year, characters, lines: [{ character, text }] }`.
 *
 * ## Features
 *
 * - Extract text from PDFs (embedded text, OCR fallback), screenplay HTML,
 *   wiki transcripts and plain text
 * - Parse dialogue with a layout-aware heuristic state machine
 * - Parse dialogue with language models in overlapping chunks:
 *   - Gemini (including whole-PDF input)
 *   - Anthropic API
 *   - OpenAI API
 *   - Ollama (local LLM)
 * - Score candidate scripts against subtitle tracks and fuse the best one
 * - Download scripts from the IMSDb archive
 * - Batch processing with per-unit success / degraded / failed reporting
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `document`: Canonical records (`DialogueLine`, `ScriptDocument`, ...)
 * - `extraction`: Source extractors and the fallback chain
 * - `parser`: Heuristic screenplay parser
 * - `normalize`: Text normalizer
 * - `llm`: Chunking, JSON repair, backoff, prompts and the chunked parser
 * - `providers`: Client implementations for the LLM providers
 * - `subtitle_processor`: SRT handling
 * - `validation`: Overlap scoring, source selection and fusion
 * - `scrapers`: Script archive clients
 * - `pipeline`: Per-unit orchestration and batch execution
 * - `file_utils`: File system operations
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod document;
pub mod errors;
pub mod extraction;
pub mod file_utils;
pub mod llm;
pub mod normalize;
pub mod parser;
pub mod pipeline;
pub mod providers;
pub mod scrapers;
pub mod subtitle_processor;
pub mod validation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use document::{DialogueLine, FusedDialogue, ScriptDocument, TextElement, ValidationResult};
pub use errors::{AppError, ExtractionError, ParseError, ProviderError};
pub use extraction::{Extracted, ExtractorChain, Source};
pub use parser::{HeuristicParser, SourceFamily};
pub use pipeline::{ParseOptions, Pipeline, UnitOutcome, UnitReport};
pub use subtitle_processor::{SubtitleEntry, SubtitleTrack};
