/*!
 * Canonical dialogue records.
 *
 * `ScriptDocument` is the output every parser produces and the only shape
 * downstream consumers read. Its character roster is derived from its lines
 * in exactly one place (`ScriptDocument::from_parts`), including when a
 * document is deserialized.
 */

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static SLUG_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s_]+").unwrap());
static SLUG_INVALID: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9-]").unwrap());
static SLUG_DASHES: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").unwrap());

/// One spoken line attributed to one character
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueLine {
    pub character: String,
    pub text: String,
}

impl DialogueLine {
    /// Build a line, trimming both fields and collapsing whitespace in the text.
    /// Returns `None` when either field ends up empty.
    pub fn new(character: impl AsRef<str>, text: impl AsRef<str>) -> Option<Self> {
        let character = character.as_ref().trim();
        let text = text.as_ref().split_whitespace().collect::<Vec<_>>().join(" ");
        if character.is_empty() || text.is_empty() {
            return None;
        }
        Some(Self {
            character: character.to_string(),
            text,
        })
    }
}

/// Serialized form of a document; the roster is ignored on input
#[derive(Deserialize)]
struct ScriptDocumentRecord {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default)]
    lines: Vec<DialogueLine>,
}

impl From<ScriptDocumentRecord> for ScriptDocument {
    fn from(record: ScriptDocumentRecord) -> Self {
        ScriptDocument::from_parts(record.id, record.title, record.year, record.lines)
    }
}

/// A parsed screenplay in canonical form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ScriptDocumentRecord")]
pub struct ScriptDocument {
    id: String,
    title: String,
    year: Option<i32>,
    characters: Vec<String>,
    lines: Vec<DialogueLine>,
}

impl ScriptDocument {
    /// Build a document from its lines. Lines with an empty field are dropped
    /// and the character roster is recomputed.
    pub fn from_parts(
        id: impl Into<String>,
        title: impl Into<String>,
        year: Option<i32>,
        lines: Vec<DialogueLine>,
    ) -> Self {
        let lines: Vec<DialogueLine> = lines
            .into_iter()
            .filter(|l| !l.character.trim().is_empty() && !l.text.trim().is_empty())
            .collect();
        let characters = Self::derive_characters(&lines);
        Self {
            id: id.into(),
            title: title.into(),
            year,
            characters,
            lines,
        }
    }

    /// Build a document whose id is the slug of its title
    pub fn titled(title: impl Into<String>, year: Option<i32>, lines: Vec<DialogueLine>) -> Self {
        let title = title.into();
        Self::from_parts(slugify(&title), title, year, lines)
    }

    /// Sorted unique character names appearing in `lines`
    pub fn derive_characters(lines: &[DialogueLine]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.character.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// A new document with the same metadata and different lines
    pub fn with_lines(&self, lines: Vec<DialogueLine>) -> Self {
        Self::from_parts(self.id.clone(), self.title.clone(), self.year, lines)
    }

    /// A new document with overridden metadata. Empty strings keep the current value.
    pub fn with_metadata(self, id: Option<String>, title: Option<String>, year: Option<i32>) -> Self {
        let title = title.filter(|t| !t.is_empty()).unwrap_or(self.title);
        let id = id
            .filter(|i| !i.is_empty())
            .or_else(|| (!self.id.is_empty()).then_some(self.id))
            .unwrap_or_else(|| slugify(&title));
        Self::from_parts(id, title, year.or(self.year), self.lines)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn year(&self) -> Option<i32> {
        self.year
    }

    pub fn characters(&self) -> &[String] {
        &self.characters
    }

    pub fn lines(&self) -> &[DialogueLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Pretty JSON in the canonical output schema
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// A unit of extracted text carrying layout signal for the heuristic parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextElement {
    pub content: String,
    pub is_bold: bool,
    pub indent: usize,
}

impl TextElement {
    pub fn new(content: impl Into<String>, is_bold: bool, indent: usize) -> Self {
        Self {
            content: content.into(),
            is_bold,
            indent,
        }
    }

    /// An element for a plain text line, indent taken from leading spaces
    pub fn from_line(line: &str) -> Self {
        let indent = line.len() - line.trim_start_matches(' ').len();
        Self::new(line.trim(), false, indent)
    }

    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// One subtitle line found in a script, with a little surrounding context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleMatch {
    pub subtitle_line: String,
    pub script_context: String,
}

/// Overlap between one candidate script and one subtitle track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Fraction of checked subtitle lines found in the script, within [0, 1]
    pub overlap_score: f64,
    pub matched_lines: usize,
    pub total_checked: usize,
    pub sample_matches: Vec<SampleMatch>,
    /// Set when the score is under the configured confidence floor
    pub low_confidence: bool,
}

impl ValidationResult {
    pub fn empty() -> Self {
        Self {
            overlap_score: 0.0,
            matched_lines: 0,
            total_checked: 0,
            sample_matches: Vec::new(),
            low_confidence: true,
        }
    }
}

/// Script character attribution merged onto subtitle dialogue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedDialogue {
    pub movie: String,
    pub year: Option<i32>,
    pub subtitle_source: String,
    pub script_source: String,
    pub script_overlap_score: f64,
    pub lines: Vec<DialogueLine>,
    /// RFC 3339 timestamp of the fusion run
    pub extraction_time: String,
    /// Wall-clock seconds spent in the model calls
    pub elapsed_secs: f64,
    pub total_subtitle_lines: usize,
    /// `lines.len() / total_subtitle_lines`
    pub fusion_coverage: f64,
    pub low_confidence: bool,
}

impl FusedDialogue {
    /// The fused lines in canonical document form
    pub fn to_script_document(&self) -> ScriptDocument {
        ScriptDocument::titled(self.movie.clone(), self.year, self.lines.clone())
    }
}

/// Lowercase, dash-separated identifier for a title
pub fn slugify(text: &str) -> String {
    let lower = text.to_lowercase();
    let dashed = SLUG_SEPARATORS.replace_all(&lower, "-");
    let cleaned = SLUG_INVALID.replace_all(&dashed, "");
    let collapsed = SLUG_DASHES.replace_all(&cleaned, "-");
    collapsed.trim_matches('-').to_string()
}
