/*!
 * Source extraction.
 *
 * Every way of reading a source is an `ExtractionStrategy` returning an
 * explicit `ExtractionResult`. An `ExtractorChain` tries its strategies in
 * order, runs the garbage detector over each success, and only fails once
 * every strategy has been exhausted.
 */

use async_trait::async_trait;
use log::{debug, info, warn};

use crate::app_config::ExtractionConfig;
use crate::document::TextElement;
use crate::errors::ExtractionError;
use crate::parser::SourceFamily;

pub mod fetch;
pub mod garbage;
pub mod html;
pub mod ocr;
pub mod pdf;
pub mod tools;

pub use fetch::{FetchedPage, PageFetcher};
pub use garbage::GarbageDetector;
pub use ocr::OcrExtractor;
pub use pdf::PdfTextExtractor;

/// Raw input handed to the extraction layer
#[derive(Debug, Clone)]
pub enum Source {
    /// PDF file contents
    Pdf(Vec<u8>),
    /// Screenplay HTML (archive dumps, role-tagged pages)
    Html(String),
    /// MediaWiki/Fandom transcript page
    WikiHtml(String),
    /// Already-plain text
    Text(String),
}

impl Source {
    pub fn kind(&self) -> &'static str {
        match self {
            Source::Pdf(_) => "pdf",
            Source::Html(_) => "html",
            Source::WikiHtml(_) => "wiki",
            Source::Text(_) => "text",
        }
    }

    /// Classify a fetched page
    pub fn from_page(page: FetchedPage, config: &crate::app_config::FetchConfig) -> Self {
        if page.is_wiki(config) {
            Source::WikiHtml(page.html)
        } else {
            Source::Html(page.html)
        }
    }
}

/// Successful output of one strategy
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    /// Flat text, indentation encoded as leading spaces
    Text(String),
    /// Typed layout elements
    Elements(Vec<TextElement>),
}

impl Extracted {
    /// Flatten to text, rendering element indents as spaces
    pub fn to_text(&self) -> String {
        match self {
            Extracted::Text(text) => text.clone(),
            Extracted::Elements(elements) => elements
                .iter()
                .map(|e| format!("{}{}", " ".repeat(e.indent), e.content))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Element view; text lines become unbolded elements
    pub fn into_elements(self) -> Vec<TextElement> {
        match self {
            Extracted::Text(text) => text.lines().map(TextElement::from_line).collect(),
            Extracted::Elements(elements) => elements,
        }
    }
}

pub type ExtractionResult = Result<Extracted, ExtractionError>;

/// One way of reading a source
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    /// Short name used in logs and failure reasons
    fn name(&self) -> &'static str;

    /// Parser family that understands this strategy's output
    fn family(&self) -> SourceFamily;

    /// Whether this strategy can read `source` at all
    fn accepts(&self, source: &Source) -> bool;

    async fn extract(&self, source: &Source) -> ExtractionResult;
}

/// Embedded-text PDF with layout-derived indentation
pub struct PdfLayoutStrategy {
    extractor: PdfTextExtractor,
}

impl PdfLayoutStrategy {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self { extractor: PdfTextExtractor::new(config) }
    }
}

#[async_trait]
impl ExtractionStrategy for PdfLayoutStrategy {
    fn name(&self) -> &'static str {
        "pdf-layout"
    }

    fn family(&self) -> SourceFamily {
        SourceFamily::PdfLayout
    }

    fn accepts(&self, source: &Source) -> bool {
        matches!(source, Source::Pdf(_))
    }

    async fn extract(&self, source: &Source) -> ExtractionResult {
        match source {
            Source::Pdf(bytes) => self.extractor.extract(bytes).map(Extracted::Text),
            other => Err(ExtractionError::Unsupported(other.kind().to_string())),
        }
    }
}

/// Embedded-text PDF as plain reading-order lines, for the language model
pub struct PdfTextStrategy {
    extractor: PdfTextExtractor,
}

impl PdfTextStrategy {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self { extractor: PdfTextExtractor::simple(config) }
    }
}

#[async_trait]
impl ExtractionStrategy for PdfTextStrategy {
    fn name(&self) -> &'static str {
        "pdf-text"
    }

    fn family(&self) -> SourceFamily {
        SourceFamily::PdfLayout
    }

    fn accepts(&self, source: &Source) -> bool {
        matches!(source, Source::Pdf(_))
    }

    async fn extract(&self, source: &Source) -> ExtractionResult {
        match source {
            Source::Pdf(bytes) => self.extractor.extract(bytes).map(Extracted::Text),
            other => Err(ExtractionError::Unsupported(other.kind().to_string())),
        }
    }
}

/// Rasterise and OCR an image-only PDF
pub struct OcrStrategy {
    extractor: OcrExtractor,
}

impl OcrStrategy {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self { extractor: OcrExtractor::new(config) }
    }
}

#[async_trait]
impl ExtractionStrategy for OcrStrategy {
    fn name(&self) -> &'static str {
        "ocr"
    }

    fn family(&self) -> SourceFamily {
        SourceFamily::Ocr
    }

    fn accepts(&self, source: &Source) -> bool {
        matches!(source, Source::Pdf(_))
    }

    async fn extract(&self, source: &Source) -> ExtractionResult {
        match source {
            Source::Pdf(bytes) => self.extractor.extract(bytes).await.map(Extracted::Text),
            other => Err(ExtractionError::Unsupported(other.kind().to_string())),
        }
    }
}

/// Role-tagged HTML (speaker / dia / slug ids)
pub struct HtmlRolesStrategy;

#[async_trait]
impl ExtractionStrategy for HtmlRolesStrategy {
    fn name(&self) -> &'static str {
        "html-roles"
    }

    fn family(&self) -> SourceFamily {
        SourceFamily::Structured
    }

    fn accepts(&self, source: &Source) -> bool {
        matches!(source, Source::Html(_))
    }

    async fn extract(&self, source: &Source) -> ExtractionResult {
        match source {
            Source::Html(html) => html::extract_roles(html)
                .map(Extracted::Elements)
                .ok_or_else(|| ExtractionError::Unsupported("no role-tagged elements".to_string())),
            other => Err(ExtractionError::Unsupported(other.kind().to_string())),
        }
    }
}

/// Verbatim `<pre>` blocks
pub struct HtmlPreStrategy;

#[async_trait]
impl ExtractionStrategy for HtmlPreStrategy {
    fn name(&self) -> &'static str {
        "html-pre"
    }

    fn family(&self) -> SourceFamily {
        SourceFamily::Preformatted
    }

    fn accepts(&self, source: &Source) -> bool {
        matches!(source, Source::Html(_))
    }

    async fn extract(&self, source: &Source) -> ExtractionResult {
        match source {
            Source::Html(html) => html::pre_text(html)
                .map(Extracted::Text)
                .ok_or_else(|| ExtractionError::Unsupported("no <pre> blocks".to_string())),
            other => Err(ExtractionError::Unsupported(other.kind().to_string())),
        }
    }
}

/// Layout walk over `<pre>` or the body
pub struct HtmlWalkStrategy;

#[async_trait]
impl ExtractionStrategy for HtmlWalkStrategy {
    fn name(&self) -> &'static str {
        "html-walk"
    }

    fn family(&self) -> SourceFamily {
        SourceFamily::Preformatted
    }

    fn accepts(&self, source: &Source) -> bool {
        matches!(source, Source::Html(_))
    }

    async fn extract(&self, source: &Source) -> ExtractionResult {
        match source {
            Source::Html(html) => {
                let elements = html::walk(html);
                if elements.is_empty() {
                    return Err(ExtractionError::NoText { chars: 0, pages: 1 });
                }
                Ok(Extracted::Elements(elements))
            }
            other => Err(ExtractionError::Unsupported(other.kind().to_string())),
        }
    }
}

/// Wiki transcript content block
pub struct WikiTranscriptStrategy;

#[async_trait]
impl ExtractionStrategy for WikiTranscriptStrategy {
    fn name(&self) -> &'static str {
        "wiki"
    }

    fn family(&self) -> SourceFamily {
        SourceFamily::Transcript
    }

    fn accepts(&self, source: &Source) -> bool {
        matches!(source, Source::WikiHtml(_) | Source::Html(_))
    }

    async fn extract(&self, source: &Source) -> ExtractionResult {
        match source {
            Source::WikiHtml(html) | Source::Html(html) => html::extract_wiki(html)
                .map(Extracted::Text)
                .ok_or(ExtractionError::NoText { chars: 0, pages: 1 }),
            other => Err(ExtractionError::Unsupported(other.kind().to_string())),
        }
    }
}

/// Plain text passes through untouched
pub struct PlainTextStrategy;

#[async_trait]
impl ExtractionStrategy for PlainTextStrategy {
    fn name(&self) -> &'static str {
        "text"
    }

    fn family(&self) -> SourceFamily {
        SourceFamily::Preformatted
    }

    fn accepts(&self, source: &Source) -> bool {
        matches!(source, Source::Text(_))
    }

    async fn extract(&self, source: &Source) -> ExtractionResult {
        match source {
            Source::Text(text) if !text.trim().is_empty() => Ok(Extracted::Text(text.clone())),
            Source::Text(_) => Err(ExtractionError::NoText { chars: 0, pages: 1 }),
            other => Err(ExtractionError::Unsupported(other.kind().to_string())),
        }
    }
}

/// Outcome of a successful chain run
#[derive(Debug, Clone)]
pub struct Extraction {
    pub content: Extracted,
    pub family: SourceFamily,
    /// Name of the strategy that succeeded
    pub strategy: &'static str,
    /// Reasons earlier strategies were rejected
    pub failures: Vec<String>,
}

impl Extraction {
    /// Whether a fallback strategy had to be used
    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Ordered list of strategies tried until one yields usable text
pub struct ExtractorChain {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    detector: GarbageDetector,
}

impl ExtractorChain {
    pub fn new(detector: GarbageDetector) -> Self {
        Self {
            strategies: Vec::new(),
            detector,
        }
    }

    pub fn with_strategy(mut self, strategy: impl ExtractionStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Default fallback order for the kind of `source`
    pub fn for_source(source: &Source, config: &ExtractionConfig) -> Self {
        let chain = Self::new(GarbageDetector::from_config(config));
        match source {
            Source::Pdf(_) => chain
                .with_strategy(PdfLayoutStrategy::new(config))
                .with_strategy(OcrStrategy::new(config)),
            Source::Html(_) => chain
                .with_strategy(HtmlRolesStrategy)
                .with_strategy(HtmlWalkStrategy),
            Source::WikiHtml(_) => chain.with_strategy(WikiTranscriptStrategy),
            Source::Text(_) => chain.with_strategy(PlainTextStrategy),
        }
    }

    /// Fallback order when the text goes to a language model: layout is
    /// dropped for PDFs and `<pre>` dumps are taken verbatim
    pub fn for_llm(source: &Source, config: &ExtractionConfig) -> Self {
        let chain = Self::new(GarbageDetector::from_config(config));
        match source {
            Source::Pdf(_) => chain
                .with_strategy(PdfTextStrategy::new(config))
                .with_strategy(OcrStrategy::new(config)),
            Source::Html(_) => chain
                .with_strategy(HtmlPreStrategy)
                .with_strategy(HtmlRolesStrategy)
                .with_strategy(HtmlWalkStrategy),
            _ => Self::for_source(source, config),
        }
    }

    /// OCR without trying the embedded text first
    pub fn ocr_only(config: &ExtractionConfig) -> Self {
        Self::new(GarbageDetector::from_config(config)).with_strategy(OcrStrategy::new(config))
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Try each accepting strategy in order
    pub async fn extract(&self, source: &Source) -> Result<Extraction, ExtractionError> {
        let mut failures = Vec::new();

        for strategy in self.strategies.iter().filter(|s| s.accepts(source)) {
            debug!("Trying {} extraction on {} source", strategy.name(), source.kind());
            let outcome = match strategy.extract(source).await {
                Ok(content) => self.detector.check(&content.to_text()).map(|_| content),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(content) => {
                    info!("Extracted {} source with {}", source.kind(), strategy.name());
                    return Ok(Extraction {
                        content,
                        family: strategy.family(),
                        strategy: strategy.name(),
                        failures,
                    });
                }
                Err(e) => {
                    warn!("{} extraction failed: {}", strategy.name(), e);
                    failures.push(format!("{}: {}", strategy.name(), e));
                }
            }
        }

        if failures.is_empty() {
            failures.push(format!("no strategy accepts {} sources", source.kind()));
        }
        Err(ExtractionError::Exhausted(failures))
    }
}
