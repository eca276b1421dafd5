/*!
 * OCR extraction for image-only PDFs.
 *
 * Pages are rasterised with `pdftoppm`, then `tesseract` reports word-level
 * boxes in TSV form. Words are regrouped into visual lines and the leading
 * word's left offset becomes the indent, so cue/dialogue columns survive.
 */

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use log::{debug, info};
use walkdir::WalkDir;

use crate::app_config::ExtractionConfig;
use crate::errors::ExtractionError;
use crate::extraction::tools::run_tool;

/// Max tesseract processes in flight
const PAGE_CONCURRENCY: usize = 4;

/// One recognised word with its layout identity
#[derive(Debug, Clone, PartialEq)]
struct OcrWord {
    block: u32,
    paragraph: u32,
    line: u32,
    left: u32,
    text: String,
}

fn parse_word_row(row: &str) -> Option<OcrWord> {
    // level page_num block_num par_num line_num word_num left top width height conf text
    let cols: Vec<&str> = row.split('\t').collect();
    if cols.len() < 12 || cols[0] != "5" {
        return None;
    }
    let text = cols[11..].join("\t");
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(OcrWord {
        block: cols[2].parse().ok()?,
        paragraph: cols[3].parse().ok()?,
        line: cols[4].parse().ok()?,
        left: cols[6].parse().ok()?,
        text: text.to_string(),
    })
}

/// Rebuild indented lines from one page of tesseract TSV output
pub fn parse_tesseract_tsv(tsv: &str, indent_ratio: f32) -> String {
    let mut order: Vec<(u32, u32, u32)> = Vec::new();
    let mut grouped: HashMap<(u32, u32, u32), Vec<OcrWord>> = HashMap::new();

    for word in tsv.lines().skip(1).filter_map(parse_word_row) {
        let key = (word.block, word.paragraph, word.line);
        if !grouped.contains_key(&key) {
            order.push(key);
        }
        grouped.entry(key).or_default().push(word);
    }

    let ratio = if indent_ratio > 0.0 { indent_ratio } else { 1.0 };
    let mut lines = Vec::with_capacity(order.len());
    for key in order {
        let Some(mut words) = grouped.remove(&key) else {
            continue;
        };
        words.sort_by_key(|w| w.left);
        let indent = (words[0].left as f32 / ratio).floor() as usize;
        let text: Vec<&str> = words.iter().map(|w| w.text.as_str()).collect();
        lines.push(format!("{}{}", " ".repeat(indent), text.join(" ")));
    }
    lines.join("\n")
}

/// Image-PDF extractor backed by `pdftoppm` and `tesseract`
#[derive(Debug, Clone)]
pub struct OcrExtractor {
    dpi: u32,
    indent_ratio: f32,
    max_pages: Option<usize>,
    timeout_secs: u64,
}

impl OcrExtractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            dpi: config.ocr_dpi,
            indent_ratio: config.ocr_indent_ratio,
            max_pages: config.ocr_max_pages,
            timeout_secs: config.tool_timeout_secs,
        }
    }

    /// OCR every page and join them with blank lines
    pub async fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let workdir = tempfile::tempdir()?;
        let pdf_path = workdir.path().join("input.pdf");
        tokio::fs::write(&pdf_path, bytes).await?;

        let images = self.render_pages(&pdf_path, workdir.path()).await?;
        info!("OCR: {} page image(s) rendered at {} dpi", images.len(), self.dpi);

        let mut results: Vec<(usize, Result<String, ExtractionError>)> = stream::iter(images.into_iter().enumerate())
            .map(|(index, image)| async move { (index, self.recognize(&image).await) })
            .buffer_unordered(PAGE_CONCURRENCY)
            .collect()
            .await;
        results.sort_by_key(|(index, _)| *index);

        let mut pages = Vec::with_capacity(results.len());
        for (index, result) in results {
            let page = result?;
            debug!("OCR page {}: {} chars", index + 1, page.len());
            pages.push(page);
        }
        Ok(pages.join("\n\n"))
    }

    async fn render_pages(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, ExtractionError> {
        let prefix = out_dir.join("page");
        let mut args = vec!["-r".to_string(), self.dpi.to_string(), "-png".to_string()];
        if let Some(max) = self.max_pages {
            args.push("-l".to_string());
            args.push(max.to_string());
        }
        args.push(pdf.to_string_lossy().into_owned());
        args.push(prefix.to_string_lossy().into_owned());

        run_tool("pdftoppm", &args, self.timeout_secs).await?;

        let mut images: Vec<PathBuf> = WalkDir::new(out_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
            .collect();
        // pdftoppm zero-pads page numbers, so lexical order is page order
        images.sort();

        if images.is_empty() {
            return Err(ExtractionError::ToolFailed {
                tool: "pdftoppm".to_string(),
                message: "no page images produced".to_string(),
            });
        }
        Ok(images)
    }

    async fn recognize(&self, image: &Path) -> Result<String, ExtractionError> {
        let image_arg = image.to_string_lossy().into_owned();
        let output = run_tool(
            "tesseract",
            [image_arg.as_str(), "stdout", "--psm", "4", "tsv"],
            self.timeout_secs,
        )
        .await?;
        let tsv = String::from_utf8_lossy(&output.stdout);
        Ok(parse_tesseract_tsv(&tsv, self.indent_ratio))
    }
}
