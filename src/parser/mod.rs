/*!
 * Heuristic screenplay parser.
 *
 * A single two-state machine (`NoSpeaker` / `InSpeech`) walks the extracted
 * elements. What counts as a character cue and which lines may continue a
 * speech is delegated to a `CuePredicate` chosen by source family.
 */

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use log::debug;

use crate::app_config::ParserConfig;
use crate::document::{DialogueLine, ScriptDocument, TextElement};
use crate::extraction::Extracted;
use crate::normalize::{detect_character_at_end, normalize_character, normalize_document};

pub mod cues;

pub use cues::{Cue, CuePredicate, IndentCue, StructuredCue, TranscriptCue};

/// Layout conventions a piece of extracted text follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFamily {
    /// Embedded-text PDF with reconstructed indentation
    PdfLayout,
    /// OCR output with coarser indentation
    Ocr,
    /// Raw whitespace layout (HTML `<pre>` dumps, plain text)
    Preformatted,
    /// Role-tagged HTML with canonical indents
    Structured,
    /// `NAME: speech` lines
    Transcript,
}

impl SourceFamily {
    pub fn all() -> [SourceFamily; 5] {
        [
            SourceFamily::PdfLayout,
            SourceFamily::Ocr,
            SourceFamily::Preformatted,
            SourceFamily::Structured,
            SourceFamily::Transcript,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFamily::PdfLayout => "pdf",
            SourceFamily::Ocr => "ocr",
            SourceFamily::Preformatted => "preformatted",
            SourceFamily::Structured => "structured",
            SourceFamily::Transcript => "transcript",
        }
    }
}

impl fmt::Display for SourceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SourceFamily {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceFamily::all()
            .into_iter()
            .find(|family| family.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow!("Unknown source family: {}", s))
    }
}

enum State {
    NoSpeaker,
    InSpeech { character: String, text: Vec<String> },
}

/// Emits the pending speech, if any, and resets to `NoSpeaker`
fn flush(state: &mut State, out: &mut Vec<DialogueLine>) {
    if let State::InSpeech { character, text } = std::mem::replace(state, State::NoSpeaker) {
        if let Some(line) = DialogueLine::new(&character, text.join(" ")) {
            out.push(line);
        }
    }
}

/// Cue-driven dialogue extraction over layout elements
pub struct HeuristicParser {
    family: SourceFamily,
    predicate: Box<dyn CuePredicate>,
}

impl HeuristicParser {
    pub fn new(family: SourceFamily, predicate: Box<dyn CuePredicate>) -> Self {
        Self { family, predicate }
    }

    /// Parser with the configured thresholds for `family`
    pub fn for_family(family: SourceFamily, config: &ParserConfig) -> Self {
        let predicate: Box<dyn CuePredicate> = match family {
            SourceFamily::PdfLayout => Box::new(IndentCue::new(config.pdf_layout.clone())),
            SourceFamily::Ocr => Box::new(IndentCue::new(config.ocr.clone()).with_glued_cues()),
            SourceFamily::Preformatted => Box::new(IndentCue::new(config.preformatted.clone()).with_bold_cues()),
            SourceFamily::Structured => Box::new(StructuredCue::new()),
            SourceFamily::Transcript => Box::new(TranscriptCue),
        };
        Self::new(family, predicate)
    }

    pub fn family(&self) -> SourceFamily {
        self.family
    }

    /// Partition `elements` into ordered dialogue lines
    pub fn parse(&self, elements: &[TextElement]) -> Vec<DialogueLine> {
        let mut state = State::NoSpeaker;
        let mut lines = Vec::new();

        for element in elements {
            let content = element.content.trim();
            if content.is_empty() || cues::is_scene_heading(content) {
                flush(&mut state, &mut lines);
                continue;
            }

            if let Some(cue) = self.predicate.cue(element) {
                flush(&mut state, &mut lines);
                state = State::InSpeech {
                    character: cue.name,
                    text: cue.inline_text.into_iter().collect(),
                };
                continue;
            }

            let State::InSpeech { text, .. } = &mut state else {
                continue;
            };

            if !self.predicate.continues_speech(element) {
                flush(&mut state, &mut lines);
                continue;
            }
            if cues::is_parenthetical(content) || cues::is_short_direction(content) || cues::is_skippable(content) {
                continue;
            }

            if self.predicate.splits_glued_cues() {
                if let (speech, Some(next)) = detect_character_at_end(content) {
                    text.push(speech);
                    flush(&mut state, &mut lines);
                    state = State::InSpeech {
                        character: normalize_character(&next),
                        text: Vec::new(),
                    };
                    continue;
                }
            }
            text.push(content.to_string());
        }

        flush(&mut state, &mut lines);
        debug!("{} parser produced {} dialogue lines", self.family, lines.len());
        lines
    }

    /// Parse extracted content into a normalized document
    pub fn parse_document(&self, content: Extracted, title: &str, year: Option<i32>) -> ScriptDocument {
        let elements = content.into_elements();
        let lines = self.parse(&elements);
        normalize_document(&ScriptDocument::titled(title, year, lines))
    }
}
