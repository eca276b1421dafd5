/*!
 * Boundary-aware text chunking.
 *
 * Chunks end at the last scene heading (or blank-line paragraph break)
 * inside a short look-back window before the target size. Consecutive
 * chunks share `overlap` bytes, and each chunk starts at least half a
 * chunk after the previous one so progress is guaranteed.
 */

use once_cell::sync::Lazy;
use regex::Regex;

static SCENE_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*(?:INT\.|EXT\.)").unwrap());

/// A window of the source text, with byte offsets into it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Chunking parameters
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    size: usize,
    overlap: usize,
    lookback: usize,
}

/// Largest char boundary at or below `index`
fn floor_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

impl Chunker {
    pub fn new(size: usize, overlap: usize, lookback: usize) -> Self {
        Self {
            size: size.max(1),
            overlap,
            lookback,
        }
    }

    fn min_advance(&self) -> usize {
        (self.size / 2).max(1)
    }

    /// End offset for a chunk starting at `start`; always past `start`
    fn chunk_end(&self, text: &str, start: usize) -> usize {
        let target = floor_boundary(text, start + self.size);
        if target >= text.len() {
            return text.len();
        }
        if target <= start {
            // a single char wider than the chunk size
            return text[start..].chars().next().map_or(text.len(), |c| start + c.len_utf8());
        }

        let window = self.lookback.min(self.size / 4);
        let lo = floor_boundary(text, target.saturating_sub(window).max(start + self.min_advance()));
        if lo >= target {
            return target;
        }
        let region = &text[lo..target];

        if let Some(m) = SCENE_BOUNDARY.find_iter(region).last() {
            if lo + m.start() > start {
                return lo + m.start();
            }
        }
        match region.rfind("\n\n") {
            Some(pos) if pos > 0 => lo + pos,
            _ => target,
        }
    }

    /// Split `text` into overlapping chunks covering it completely
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < text.len() {
            let end = self.chunk_end(text, start);
            chunks.push(Chunk {
                start,
                end,
                text: text[start..end].to_string(),
            });
            if end >= text.len() {
                break;
            }
            let next = end.saturating_sub(self.overlap).max(start + self.min_advance()).min(end);
            let next = floor_boundary(text, next);
            start = if next > start { next } else { end };
        }
        chunks
    }
}

/// Rebuild the source by dropping each chunk's overlap with its predecessor
pub fn reassemble(chunks: &[Chunk]) -> String {
    let mut out = String::new();
    let mut covered: usize = 0;
    for chunk in chunks {
        let skip = covered.saturating_sub(chunk.start);
        if skip < chunk.text.len() {
            out.push_str(&chunk.text[skip..]);
        }
        covered = covered.max(chunk.end);
    }
    out
}
