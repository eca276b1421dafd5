/*!
 * Character-cue predicates, one per source family.
 */

use once_cell::sync::Lazy;
use regex::Regex;

use crate::app_config::CueThresholds;
use crate::document::TextElement;
use crate::extraction::html::{DIALOGUE_INDENT, DIRECTION_INDENT, SPEAKER_INDENT};
use crate::normalize::normalize_character;

static SCENE_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\d+[A-Z]?\.?\s+)?(?:(?i:INT\.|EXT\.|INT/EXT)|I/E\b|INTERIOR\b|EXTERIOR\b)").unwrap()
});

static NOT_A_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)^(?:",
        r"FADE (?:IN|OUT|TO)|CUT TO|SMASH CUT|MATCH CUT|DISSOLVE|THE END|FINIS\b|",
        r"CONTINUED|CONT'D|\(?MORE\)?$|",
        r"(?:TITLE|CARD|SCREEN|CREDIT|MONTAGE|SEQUENCE|SERIES|ANGLE|SHOT|VIEW|POV|CLOSE|WIDE|MEDIUM|",
        r"LATER|SAME|BACK|RESUME|INSERT|SUPER|INTERCUT|FLASHBACK|END)\b|",
        r"[\s\-]+$|\d+\.?$|#",
        r")"
    ))
    .unwrap()
});

static ANNOTATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*\)?").unwrap());

static TRANSCRIPT_CUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Z][A-Za-z0-9.'&\- ]{0,39}?)\s*(?:\([^)]*\))?\s*:\s*(.+)$").unwrap()
});

static BRACKETED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]*\]").unwrap());

/// Transcript labels that introduce notes rather than speech
const TRANSCRIPT_LABELS: &[&str] = &["SCENE", "NOTE", "SETTING", "LOCATION", "TIME", "TRANSCRIPT", "CAST"];

/// A recognised character cue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    /// Canonical character name
    pub name: String,
    /// Speech that shares the cue's line (transcript style)
    pub inline_text: Option<String>,
}

impl Cue {
    fn named(name: String) -> Self {
        Self { name, inline_text: None }
    }
}

/// Decides which elements open a speech and which continue one
pub trait CuePredicate: Send + Sync {
    fn cue(&self, element: &TextElement) -> Option<Cue>;

    /// Whether a non-cue element can continue the current speech
    fn continues_speech(&self, element: &TextElement) -> bool;

    /// Whether dialogue lines may carry the next cue glued to their end
    fn splits_glued_cues(&self) -> bool {
        false
    }
}

/// Scene headings, slug lines like `NIGHT - NEAR THE SWAMP`
pub fn is_scene_heading(text: &str) -> bool {
    let text = text.trim();
    if SCENE_HEADING.is_match(text) {
        return true;
    }
    text.contains(" - ") && is_upper_case(text)
}

/// Text that can never be a character name or speech
pub fn is_skippable(text: &str) -> bool {
    NOT_A_NAME.is_match(text.trim())
}

/// Has upper-case letters and no lower-case ones
pub fn is_upper_case(text: &str) -> bool {
    text.chars().any(|c| c.is_uppercase()) && !text.chars().any(|c| c.is_lowercase())
}

/// Wrapped in parentheses, e.g. `(beat)`
pub fn is_parenthetical(text: &str) -> bool {
    let text = text.trim();
    text.starts_with('(') && text.ends_with(')')
}

/// Short upper-case line inside a speech, treated as a direction
pub fn is_short_direction(text: &str) -> bool {
    is_upper_case(text) && text.split_whitespace().count() <= 3
}

/// Canonical name if `text` reads as an upper-case cue within the length bounds
fn cue_name(text: &str, thresholds: &CueThresholds) -> Option<String> {
    let text = text.trim();
    if text.ends_with(':') || is_scene_heading(text) || is_skippable(text) {
        return None;
    }
    let bare = ANNOTATION.replace_all(text, "");
    let bare = bare.trim();
    if !is_upper_case(bare) || bare.split_whitespace().count() > 5 {
        return None;
    }
    let name = normalize_character(text);
    let len = name.chars().count();
    if len < thresholds.min_name_len || len > thresholds.max_name_len || is_skippable(&name) {
        return None;
    }
    Some(name)
}

/// Indentation-based cues for layout text (PDF, OCR, preformatted dumps)
#[derive(Debug, Clone)]
pub struct IndentCue {
    thresholds: CueThresholds,
    bold_marks_cue: bool,
    glued_cues: bool,
}

impl IndentCue {
    pub fn new(thresholds: CueThresholds) -> Self {
        Self {
            thresholds,
            bold_marks_cue: false,
            glued_cues: false,
        }
    }

    /// Bold upper-case text is a cue at any indent
    pub fn with_bold_cues(mut self) -> Self {
        self.bold_marks_cue = true;
        self
    }

    /// OCR output can merge the next cue onto a dialogue line
    pub fn with_glued_cues(mut self) -> Self {
        self.glued_cues = true;
        self
    }
}

impl CuePredicate for IndentCue {
    fn cue(&self, element: &TextElement) -> Option<Cue> {
        let placed = element.indent >= self.thresholds.cue_min_indent || (self.bold_marks_cue && element.is_bold);
        if !placed {
            return None;
        }
        cue_name(&element.content, &self.thresholds).map(Cue::named)
    }

    fn continues_speech(&self, element: &TextElement) -> bool {
        (self.thresholds.dialogue_min_indent..=self.thresholds.dialogue_max_indent).contains(&element.indent)
    }

    fn splits_glued_cues(&self) -> bool {
        self.glued_cues
    }
}

/// Role-tagged HTML: speakers are bold at the canonical speaker indent
#[derive(Debug, Clone)]
pub struct StructuredCue {
    thresholds: CueThresholds,
}

impl StructuredCue {
    pub fn new() -> Self {
        Self {
            thresholds: CueThresholds::new(SPEAKER_INDENT, DIALOGUE_INDENT, DIRECTION_INDENT),
        }
    }
}

impl Default for StructuredCue {
    fn default() -> Self {
        Self::new()
    }
}

impl CuePredicate for StructuredCue {
    fn cue(&self, element: &TextElement) -> Option<Cue> {
        if !element.is_bold || element.indent != SPEAKER_INDENT {
            return None;
        }
        let name = normalize_character(&element.content);
        let len = name.chars().count();
        (len >= self.thresholds.min_name_len && len <= self.thresholds.max_name_len && !is_skippable(&name))
            .then(|| Cue::named(name))
    }

    fn continues_speech(&self, element: &TextElement) -> bool {
        element.indent == DIALOGUE_INDENT || element.indent == DIRECTION_INDENT
    }
}

/// `NAME: speech` transcript lines
#[derive(Debug, Clone, Default)]
pub struct TranscriptCue;

impl CuePredicate for TranscriptCue {
    fn cue(&self, element: &TextElement) -> Option<Cue> {
        let caps = TRANSCRIPT_CUE.captures(element.content.trim())?;
        let label = caps[1].trim();
        if label.split_whitespace().count() > 4 {
            return None;
        }
        let name = normalize_character(label);
        if name.chars().count() < 2 || TRANSCRIPT_LABELS.contains(&name.as_str()) {
            return None;
        }
        let speech = BRACKETED.replace_all(&caps[2], "");
        let speech = speech.trim();
        Some(Cue {
            name,
            inline_text: (!speech.is_empty()).then(|| speech.to_string()),
        })
    }

    fn continues_speech(&self, _element: &TextElement) -> bool {
        false
    }
}
