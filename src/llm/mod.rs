/*!
 * Language-model assisted parsing.
 *
 * - `chunking`: boundary-aware overlapping windows
 * - `prompts`: the extraction and fusion contracts
 * - `json_repair`: lenient recovery of model JSON
 * - `backoff`: retry policy for rate-limited calls
 * - `parser`: the chunk-by-chunk driver
 */

pub mod backoff;
pub mod chunking;
pub mod json_repair;
pub mod parser;
pub mod prompts;

pub use backoff::BackoffPolicy;
pub use chunking::{Chunk, Chunker};
pub use parser::{ChunkedLlmParser, ParseOutcome, ParseReport, TextMode};
