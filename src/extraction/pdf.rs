/*!
 * Embedded-text PDF extraction with layout reconstruction.
 *
 * Text runs are read straight from page content streams. Each run keeps the
 * origin of the text matrix it was drawn at; runs sharing an integer baseline
 * form one visual line and the leftmost run's x offset, divided by a fixed
 * ratio, becomes the line's indent in columns.
 */

use std::collections::BTreeMap;

use log::debug;
use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};

use crate::app_config::ExtractionConfig;
use crate::errors::ExtractionError;

/// A piece of text drawn at a position on the page
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub x: f32,
    pub y: f32,
    pub text: String,
}

/// Affine text matrix `[a b c d e f]`
#[derive(Debug, Clone, Copy)]
struct Matrix([f32; 6]);

impl Matrix {
    const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn translate(self, tx: f32, ty: f32) -> Matrix {
        let [a, b, c, d, e, f] = self.0;
        Matrix([a, b, c, d, e + tx * a + ty * c, f + tx * b + ty * d])
    }

    fn origin(&self) -> (f32, f32) {
        (self.0[4], self.0[5])
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn numbers(operands: &[Object]) -> Vec<f32> {
    operands.iter().filter_map(number).collect()
}

/// Decode a PDF string object as UTF-16BE (with BOM) or Latin-1
pub fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

fn push_run(runs: &mut Vec<TextRun>, matrix: &Matrix, text: String) {
    if !text.trim().is_empty() {
        let (x, y) = matrix.origin();
        runs.push(TextRun { x, y, text });
    }
}

fn shown_text(obj: &Object) -> String {
    match obj {
        Object::String(bytes, _) => decode_pdf_string(bytes),
        Object::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Object::String(bytes, _) => Some(decode_pdf_string(bytes)),
                // Large negative kerning inside TJ is a word gap
                other => number(other).filter(|n| *n < -200.0).map(|_| " ".to_string()),
            })
            .collect(),
        _ => String::new(),
    }
}

/// Walk a decoded content stream and collect positioned text runs
pub fn collect_runs(content: &Content) -> Vec<TextRun> {
    let mut runs = Vec::new();
    let mut line_matrix = Matrix::IDENTITY;
    let mut text_matrix = Matrix::IDENTITY;
    let mut leading = 0.0f32;

    for op in &content.operations {
        match op.operator.as_str() {
            "BT" => {
                line_matrix = Matrix::IDENTITY;
                text_matrix = Matrix::IDENTITY;
            }
            "Tm" => {
                let n = numbers(&op.operands);
                if n.len() == 6 {
                    line_matrix = Matrix([n[0], n[1], n[2], n[3], n[4], n[5]]);
                    text_matrix = line_matrix;
                }
            }
            "Td" | "TD" => {
                let n = numbers(&op.operands);
                if n.len() == 2 {
                    if op.operator == "TD" {
                        leading = -n[1];
                    }
                    line_matrix = line_matrix.translate(n[0], n[1]);
                    text_matrix = line_matrix;
                }
            }
            "TL" => {
                if let Some(l) = op.operands.first().and_then(number) {
                    leading = l;
                }
            }
            "T*" => {
                line_matrix = line_matrix.translate(0.0, -leading);
                text_matrix = line_matrix;
            }
            "Tj" | "TJ" => {
                if let Some(obj) = op.operands.first() {
                    push_run(&mut runs, &text_matrix, shown_text(obj));
                }
            }
            "'" | "\"" => {
                line_matrix = line_matrix.translate(0.0, -leading);
                text_matrix = line_matrix;
                if let Some(obj) = op.operands.last() {
                    push_run(&mut runs, &text_matrix, shown_text(obj));
                }
            }
            _ => {}
        }
    }
    runs
}

/// Group runs into visual lines, top of page first.
/// With `indent_ratio` set, each line is prefixed by its indent in spaces.
pub fn layout_lines(runs: &[TextRun], indent_ratio: Option<f32>) -> Vec<String> {
    let mut bands: BTreeMap<i64, Vec<&TextRun>> = BTreeMap::new();
    for run in runs {
        bands.entry(run.y.floor() as i64).or_default().push(run);
    }

    bands
        .into_values()
        .rev()
        .map(|mut band| {
            band.sort_by(|a, b| a.x.total_cmp(&b.x));
            let text = band
                .iter()
                .map(|r| r.text.trim())
                .collect::<Vec<_>>()
                .join(" ");
            match indent_ratio {
                Some(ratio) if ratio > 0.0 => {
                    let indent = (band[0].x.max(0.0) / ratio) as usize;
                    format!("{}{}", " ".repeat(indent), text)
                }
                _ => text,
            }
        })
        .collect()
}

/// Layout-preserving text extractor for PDFs with an embedded text layer
#[derive(Debug, Clone)]
pub struct PdfTextExtractor {
    indent_ratio: Option<f32>,
    min_chars_per_page: usize,
    min_total_chars: usize,
}

impl PdfTextExtractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            indent_ratio: Some(config.pdf_indent_ratio),
            min_chars_per_page: config.min_chars_per_page,
            min_total_chars: config.min_total_chars,
        }
    }

    /// Same thresholds, no indentation; used for text sent to a language model
    pub fn simple(config: &ExtractionConfig) -> Self {
        Self {
            indent_ratio: None,
            ..Self::new(config)
        }
    }

    /// Text of every page in order
    pub fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        let doc = Document::load_mem(bytes).map_err(|e| ExtractionError::Pdf(e.to_string()))?;
        if doc.is_encrypted() {
            return Err(ExtractionError::Pdf("document is encrypted".to_string()));
        }

        let pages: BTreeMap<u32, ObjectId> = doc.get_pages();
        let mut texts = Vec::with_capacity(pages.len());
        for (page_num, page_id) in pages {
            let text = match page_text(&doc, page_id, self.indent_ratio) {
                Ok(text) => text,
                Err(e) => {
                    debug!("Page {} has no readable content stream: {}", page_num, e);
                    String::new()
                }
            };
            texts.push(text);
        }
        Ok(texts)
    }

    /// Extract the whole document, rejecting it when too little text is present
    pub fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let pages = self.extract_pages(bytes)?;
        check_page_sufficiency(&pages, self.min_chars_per_page, self.min_total_chars)?;
        Ok(pages.join("\n\n"))
    }
}

fn page_text(doc: &Document, page_id: ObjectId, indent_ratio: Option<f32>) -> Result<String, lopdf::Error> {
    let raw = doc.get_page_content(page_id)?;
    let content = Content::decode(&raw)?;
    Ok(layout_lines(&collect_runs(&content), indent_ratio).join("\n"))
}

/// Fail unless at least one page and the document as a whole carry enough text
pub fn check_page_sufficiency(
    pages: &[String],
    min_chars_per_page: usize,
    min_total_chars: usize,
) -> Result<(), ExtractionError> {
    let counts: Vec<usize> = pages.iter().map(|p| p.trim().chars().count()).collect();
    let total: usize = counts.iter().sum();
    let any_readable = counts.iter().any(|&c| c >= min_chars_per_page);
    if !any_readable || total < min_total_chars {
        return Err(ExtractionError::NoText {
            chars: total,
            pages: pages.len(),
        });
    }
    Ok(())
}

/// Number of pages in a PDF
pub fn page_count(bytes: &[u8]) -> Result<usize, ExtractionError> {
    let doc = Document::load_mem(bytes).map_err(|e| ExtractionError::Pdf(e.to_string()))?;
    Ok(doc.get_pages().len())
}

/// Split a PDF into standalone documents of at most `pages_per_chunk` pages
pub fn split_pages(bytes: &[u8], pages_per_chunk: usize) -> Result<Vec<Vec<u8>>, ExtractionError> {
    let doc = Document::load_mem(bytes).map_err(|e| ExtractionError::Pdf(e.to_string()))?;
    let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    if page_numbers.len() <= pages_per_chunk.max(1) {
        return Ok(vec![bytes.to_vec()]);
    }

    let mut parts = Vec::new();
    for window in page_numbers.chunks(pages_per_chunk.max(1)) {
        let mut part = doc.clone();
        let drop: Vec<u32> = page_numbers
            .iter()
            .copied()
            .filter(|n| !window.contains(n))
            .collect();
        part.delete_pages(&drop);
        part.prune_objects();
        let mut buffer = Vec::new();
        part.save_to(&mut buffer)
            .map_err(|e| ExtractionError::Pdf(e.to_string()))?;
        parts.push(buffer);
    }
    Ok(parts)
}
