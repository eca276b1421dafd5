use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;

use crate::llm::backoff::BackoffPolicy;

/// Application configuration module
/// This module handles loading, validating and saving the settings that every
/// pipeline stage receives through its constructor.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Text extraction thresholds
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Heuristic parser thresholds per source family
    #[serde(default)]
    pub parser: ParserConfig,

    /// LLM chunking parameters
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Retry policy for rate-limited model calls
    #[serde(default)]
    pub backoff: BackoffPolicy,

    /// Subtitle overlap validation settings
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Remote page fetching settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Language model provider settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Batch execution settings
    #[serde(default)]
    pub batch: BatchConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Thresholds used by the extraction layer
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExtractionConfig {
    // @field: A page must reach this many characters to count as readable
    #[serde(default = "default_min_chars_per_page")]
    pub min_chars_per_page: usize,

    // @field: Whole-document character floor
    #[serde(default = "default_min_total_chars")]
    pub min_total_chars: usize,

    // @field: Fail when more than this fraction of sampled lines is garbage
    #[serde(default = "default_garbage_ratio_threshold")]
    pub garbage_ratio_threshold: f64,

    // @field: Non-blank lines inspected by the garbage detector
    #[serde(default = "default_garbage_sample_lines")]
    pub garbage_sample_lines: usize,

    // @field: Prefix length inspected by the garbage detector
    #[serde(default = "default_garbage_sample_chars")]
    pub garbage_sample_chars: usize,

    // @field: Lines below this alphabetic ratio are garbage
    #[serde(default = "default_min_alpha_ratio")]
    pub min_alpha_ratio: f64,

    // @field: PDF user-space units per indent column
    #[serde(default = "default_pdf_indent_ratio")]
    pub pdf_indent_ratio: f32,

    // @field: OCR pixels per indent column
    #[serde(default = "default_ocr_indent_ratio")]
    pub ocr_indent_ratio: f32,

    // @field: Render resolution for OCR
    #[serde(default = "default_ocr_dpi")]
    pub ocr_dpi: u32,

    // @field: Optional cap on OCR'd pages
    #[serde(default)]
    pub ocr_max_pages: Option<usize>,

    // @field: Wall-clock limit for each external tool call
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_chars_per_page: default_min_chars_per_page(),
            min_total_chars: default_min_total_chars(),
            garbage_ratio_threshold: default_garbage_ratio_threshold(),
            garbage_sample_lines: default_garbage_sample_lines(),
            garbage_sample_chars: default_garbage_sample_chars(),
            min_alpha_ratio: default_min_alpha_ratio(),
            pdf_indent_ratio: default_pdf_indent_ratio(),
            ocr_indent_ratio: default_ocr_indent_ratio(),
            ocr_dpi: default_ocr_dpi(),
            ocr_max_pages: None,
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

/// Indent bands that separate character cues from dialogue.
/// All bounds are inclusive and measured in indent columns.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CueThresholds {
    /// Lowest indent at which an upper-case line can be a cue
    pub cue_min_indent: usize,
    /// Lowest indent accepted as dialogue
    pub dialogue_min_indent: usize,
    /// Highest indent accepted as dialogue
    pub dialogue_max_indent: usize,
    /// Shortest plausible character name
    #[serde(default = "default_min_name_len")]
    pub min_name_len: usize,
    /// Longest plausible character name
    #[serde(default = "default_max_name_len")]
    pub max_name_len: usize,
}

impl CueThresholds {
    pub fn new(cue_min_indent: usize, dialogue_min_indent: usize, dialogue_max_indent: usize) -> Self {
        Self {
            cue_min_indent,
            dialogue_min_indent,
            dialogue_max_indent,
            min_name_len: default_min_name_len(),
            max_name_len: default_max_name_len(),
        }
    }
}

/// Heuristic parser configuration, one threshold set per source family
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ParserConfig {
    /// Layout-reconstructed PDF text (indent ratio 6)
    #[serde(default = "default_pdf_thresholds")]
    pub pdf_layout: CueThresholds,

    /// OCR-reconstructed text (indent ratio 12)
    #[serde(default = "default_ocr_thresholds")]
    pub ocr: CueThresholds,

    /// Raw leading whitespace: HTML screenplay dumps and plain text
    #[serde(default = "default_preformatted_thresholds")]
    pub preformatted: CueThresholds,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            pdf_layout: default_pdf_thresholds(),
            ocr: default_ocr_thresholds(),
            preformatted: default_preformatted_thresholds(),
        }
    }
}

/// Chunking parameters for the LLM parser
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Target chunk size in bytes for screenplay text
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Target chunk size for free-form transcripts
    #[serde(default = "default_transcript_chunk_size")]
    pub transcript_chunk_size: usize,

    /// Bytes shared between consecutive chunks
    #[serde(default = "default_overlap")]
    pub overlap: usize,

    /// How far back from the target end to look for a boundary
    #[serde(default = "default_lookback")]
    pub lookback: usize,

    /// Pages per request when a whole PDF is sent as an attachment
    #[serde(default = "default_pages_per_chunk")]
    pub pages_per_chunk: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            transcript_chunk_size: default_transcript_chunk_size(),
            overlap: default_overlap(),
            lookback: default_lookback(),
            pages_per_chunk: default_pages_per_chunk(),
        }
    }
}

/// Subtitle overlap scoring and source selection settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ValidationConfig {
    /// Maximum subtitle lines sampled per validation
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// Fraction of a line's words that must match contiguously
    #[serde(default = "default_min_match_ratio")]
    pub min_match_ratio: f64,

    /// Floor on the contiguous word run
    #[serde(default = "default_min_match_words")]
    pub min_match_words: usize,

    /// Lines shorter than this after normalization are not counted
    #[serde(default = "default_min_normalized_len")]
    pub min_normalized_len: usize,

    /// Lines with fewer words are not checked
    #[serde(default = "default_min_line_words")]
    pub min_line_words: usize,

    /// Best scores below this carry a low-confidence flag
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Number of example matches kept for reporting
    #[serde(default = "default_max_sample_matches")]
    pub max_sample_matches: usize,

    /// Candidate scripts shorter than this are skipped
    #[serde(default = "default_min_script_chars")]
    pub min_script_chars: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            sample_size: default_sample_size(),
            min_match_ratio: default_min_match_ratio(),
            min_match_words: default_min_match_words(),
            min_normalized_len: default_min_normalized_len(),
            min_line_words: default_min_line_words(),
            min_confidence: default_min_confidence(),
            max_sample_matches: default_max_sample_matches(),
            min_script_chars: default_min_script_chars(),
        }
    }
}

/// Remote page fetching settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FetchConfig {
    // @field: HTTP timeout
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,

    // @field: User-Agent header sent with plain fetches
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    // @field: Headless browser executable
    #[serde(default = "default_browser_command")]
    pub browser_command: String,

    // @field: Virtual time the browser is given to render
    #[serde(default = "default_browser_wait_ms")]
    pub browser_wait_ms: u64,

    // @field: Body substrings that mean the page needs JavaScript
    #[serde(default = "default_js_markers")]
    pub js_markers: Vec<String>,

    // @field: Hosts that are always rendered in the browser
    #[serde(default = "default_dynamic_hosts")]
    pub dynamic_hosts: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout_secs(),
            user_agent: default_user_agent(),
            browser_command: default_browser_command(),
            browser_wait_ms: default_browser_wait_ms(),
            js_markers: default_js_markers(),
            dynamic_hosts: default_dynamic_hosts(),
        }
    }
}

/// Language model provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    // @provider: Google Gemini
    #[default]
    Gemini,
    // @provider: Anthropic
    Anthropic,
    // @provider: OpenAI
    OpenAI,
    // @provider: Ollama
    Ollama,
}

impl ProviderKind {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Gemini => "Gemini",
            Self::Anthropic => "Anthropic",
            Self::OpenAI => "OpenAI",
            Self::Ollama => "Ollama",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Gemini => "gemini".to_string(),
            Self::Anthropic => "anthropic".to_string(),
            Self::OpenAI => "openai".to_string(),
            Self::Ollama => "ollama".to_string(),
        }
    }

    // @returns: Environment variable consulted when no key is configured
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            Self::Gemini => Some("GEMINI_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::OpenAI => Some("OPENAI_API_KEY"),
            Self::Ollama => None,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "anthropic" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Timeout seconds
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProviderConfig {
    // @param kind: Provider enum
    // @returns: Provider config with defaults
    pub fn new(kind: ProviderKind) -> Self {
        let (model, endpoint) = match kind {
            ProviderKind::Gemini => (default_gemini_model(), default_gemini_endpoint()),
            ProviderKind::Anthropic => (default_anthropic_model(), default_anthropic_endpoint()),
            ProviderKind::OpenAI => (default_openai_model(), default_openai_endpoint()),
            ProviderKind::Ollama => (default_ollama_model(), default_ollama_endpoint()),
        };
        Self {
            provider_type: kind.to_lowercase_string(),
            model,
            api_key: String::new(),
            endpoint,
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

/// Language model settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LlmConfig {
    /// Provider to use
    #[serde(default)]
    pub provider: ProviderKind,

    /// Available providers
    #[serde(default = "default_available_providers")]
    pub available_providers: Vec<ProviderConfig>,

    /// Output token budget per call
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            available_providers: default_available_providers(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl LlmConfig {
    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        self.get_provider_config(&self.provider)
    }

    /// Get a specific provider configuration by type
    pub fn get_provider_config(&self, kind: &ProviderKind) -> Option<&ProviderConfig> {
        let provider_str = kind.to_lowercase_string();
        self.available_providers.iter()
            .find(|p| p.provider_type == provider_str)
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.model.is_empty() {
                return provider_config.model.clone();
            }
        }
        ProviderConfig::new(self.provider).model
    }

    /// Get the API key for the active provider, falling back to the environment
    pub fn get_api_key(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.api_key.is_empty() {
                return provider_config.api_key.clone();
            }
        }
        self.provider.api_key_env()
            .and_then(|var| std::env::var(var).ok())
            .unwrap_or_default()
    }

    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.endpoint.is_empty() {
                return provider_config.endpoint.clone();
            }
        }
        ProviderConfig::new(self.provider).endpoint
    }

    /// Get the request timeout for the active provider
    pub fn get_timeout_secs(&self) -> u64 {
        self.get_active_provider_config()
            .map(|p| p.timeout_secs)
            .unwrap_or_else(default_provider_timeout_secs)
    }

    /// Set the model on the active provider, creating its entry if missing
    pub fn set_model(&mut self, model: impl Into<String>) {
        let provider_str = self.provider.to_lowercase_string();
        let model = model.into();
        match self.available_providers.iter_mut().find(|p| p.provider_type == provider_str) {
            Some(provider_config) => provider_config.model = model,
            None => {
                let mut provider_config = ProviderConfig::new(self.provider);
                provider_config.model = model;
                self.available_providers.push(provider_config);
            }
        }
    }
}

/// Batch execution settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BatchConfig {
    /// Maximum independent units in flight
    #[serde(default = "default_batch_concurrency")]
    pub concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_batch_concurrency(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_min_chars_per_page() -> usize {
    100
}

fn default_min_total_chars() -> usize {
    200
}

fn default_garbage_ratio_threshold() -> f64 {
    0.20
}

fn default_garbage_sample_lines() -> usize {
    50
}

fn default_garbage_sample_chars() -> usize {
    3000
}

fn default_min_alpha_ratio() -> f64 {
    0.3
}

fn default_pdf_indent_ratio() -> f32 {
    6.0
}

fn default_ocr_indent_ratio() -> f32 {
    12.0
}

fn default_ocr_dpi() -> u32 {
    200
}

fn default_tool_timeout_secs() -> u64 {
    300
}

fn default_min_name_len() -> usize {
    2
}

fn default_max_name_len() -> usize {
    40
}

fn default_pdf_thresholds() -> CueThresholds {
    CueThresholds::new(31, 16, 34)
}

fn default_ocr_thresholds() -> CueThresholds {
    CueThresholds::new(16, 8, 17)
}

fn default_preformatted_thresholds() -> CueThresholds {
    CueThresholds::new(31, 5, 34)
}

fn default_chunk_size() -> usize {
    12_000
}

fn default_transcript_chunk_size() -> usize {
    15_000
}

fn default_overlap() -> usize {
    500
}

fn default_lookback() -> usize {
    500
}

fn default_pages_per_chunk() -> usize {
    10
}

fn default_sample_size() -> usize {
    100
}

fn default_min_match_ratio() -> f64 {
    0.6
}

fn default_min_match_words() -> usize {
    3
}

fn default_min_normalized_len() -> usize {
    10
}

fn default_min_line_words() -> usize {
    3
}

fn default_min_confidence() -> f64 {
    0.1
}

fn default_max_sample_matches() -> usize {
    10
}

fn default_min_script_chars() -> usize {
    1000
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_browser_command() -> String {
    "chromium".to_string()
}

fn default_browser_wait_ms() -> u64 {
    10_000
}

fn default_js_markers() -> Vec<String> {
    [
        "JavaScript is disabled",
        "Please enable JavaScript",
        "couldn't load",
        "Loading...",
        "<noscript>",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_dynamic_hosts() -> Vec<String> {
    vec!["fandom.com".to_string(), "wikia.com".to_string()]
}

fn default_provider_timeout_secs() -> u64 {
    120
}

fn default_max_tokens() -> u32 {
    8192
}

fn default_temperature() -> f32 {
    0.1
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_gemini_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-haiku".to_string()
}

fn default_anthropic_endpoint() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2:3b".to_string()
}

fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_available_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig::new(ProviderKind::Gemini),
        ProviderConfig::new(ProviderKind::Anthropic),
        ProviderConfig::new(ProviderKind::OpenAI),
        ProviderConfig::new(ProviderKind::Ollama),
    ]
}

fn default_batch_concurrency() -> usize {
    4
}

fn check_ratio(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(anyhow!("{} must be within [0, 1], got {}", name, value));
    }
    Ok(())
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        let chunking = &self.chunking;
        for (name, size) in [("chunk_size", chunking.chunk_size), ("transcript_chunk_size", chunking.transcript_chunk_size)] {
            if size == 0 {
                return Err(anyhow!("{} must be greater than zero", name));
            }
            if chunking.overlap >= size {
                return Err(anyhow!("overlap ({}) must be smaller than {} ({})", chunking.overlap, name, size));
            }
        }
        if chunking.pages_per_chunk == 0 {
            return Err(anyhow!("pages_per_chunk must be greater than zero"));
        }

        check_ratio("garbage_ratio_threshold", self.extraction.garbage_ratio_threshold)?;
        check_ratio("min_alpha_ratio", self.extraction.min_alpha_ratio)?;
        check_ratio("min_match_ratio", self.validation.min_match_ratio)?;
        check_ratio("min_confidence", self.validation.min_confidence)?;

        if self.extraction.pdf_indent_ratio <= 0.0 || self.extraction.ocr_indent_ratio <= 0.0 {
            return Err(anyhow!("Indent ratios must be positive"));
        }
        if self.validation.sample_size == 0 {
            return Err(anyhow!("Validation sample_size must be greater than zero"));
        }

        self.backoff.validate()?;

        if self.batch.concurrency == 0 {
            return Err(anyhow!("Batch concurrency must be at least 1"));
        }

        if self.llm.get_model().trim().is_empty() {
            return Err(anyhow!("No model configured for provider {}", self.llm.provider.display_name()));
        }

        Ok(())
    }
}
