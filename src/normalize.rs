/*!
 * Text normalization for dialogue text and character names.
 *
 * Every public function here is pure and idempotent. The composite
 * normalizers run their passes until the output stops changing, so a
 * correction that exposes another pattern (for instance a translation
 * marker glued inside a word) is still settled in one call.
 */

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::document::{DialogueLine, ScriptDocument};

// Upper bound on fixpoint passes; every pass strictly shrinks or rewrites
// a finite set of characters, so real inputs settle in two or three.
const MAX_PASSES: usize = 16;

static APOSTROPHE_LL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([A-Za-z]+)'11\b").unwrap());
static APOSTROPHE_NT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([A-Za-z]+n)'1\b").unwrap());
static TH_WH_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:[Tt]b(?:e|at|is|ey|en|ere|ose|ese|ink|ings|ing)|[Ww]b(?:at|en|ere|y|o))\b").unwrap()
});

static REVISION_STAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:YELLOW|BLUE|PINK|GREEN|GOLDENROD|BUFF|SALMON|CHERRY|TAN|WHITE|REVISED?)\s+\d{1,2}/\d{1,2}/\d{2,4}\b").unwrap()
});
static SCENE_NUMBER_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*\d+[A-Z]?\.?[ \t]*$").unwrap());
static PAGE_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bPAGE\s+\d+\b").unwrap());
static TRAILING_NUMBER_AFTER_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r#"([.!?"])[ \t]+\d{1,4}\.?[ \t]*$"#).unwrap());
static TRAILING_NUMBER_WIDE_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}\d{1,4}\.?[ \t]*$").unwrap());

static TRANSLATION_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"<<\s*|\s*>>").unwrap());

static PAREN_ANNOTATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\([^)]*\)?").unwrap());
static CONTINUATION_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s+(?:CONT'D|CONTD|CONTINUED|V\.O\.|O\.S\.|O\.C\.)$").unwrap());

static CHARACTER_AT_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+([A-Z][A-Z\s'\-]{1,25})\s*$").unwrap());

static NON_NAMES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "THE", "AND", "BUT", "FOR", "NOT", "YOU", "ALL", "CAN", "HAD", "HER", "WAS", "ONE",
        "OUR", "OUT", "HAS", "HIS", "HOW", "ITS", "MAY", "NEW", "NOW", "OLD", "SEE", "WAY",
        "WHO", "DID", "GET", "HIM", "LET", "PUT", "SAY", "TOO", "USE", "YES", "NO", "WHAT",
        "WITH", "HAVE", "THIS", "YOUR", "FROM", "THEY", "BEEN", "MANY", "SOME", "THEM",
        "THEN", "WERE", "SAID", "EACH", "OK", "OKAY", "I",
    ]
    .into_iter()
    .collect()
});

fn to_fixpoint(input: &str, pass: impl Fn(&str) -> String) -> String {
    let mut current = pass(input);
    for _ in 0..MAX_PASSES {
        let next = pass(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Replace `needle` with `replacement` wherever both neighbours satisfy `neighbour`.
/// Neighbours are read from the input, so one pass is already stable.
fn replace_between(text: &str, needle: char, replacement: char, neighbour: fn(char) -> bool) -> String {
    let chars: Vec<char> = text.chars().collect();
    chars
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let flanked = c == needle
                && i > 0
                && i + 1 < chars.len()
                && neighbour(chars[i - 1])
                && neighbour(chars[i + 1]);
            if flanked { replacement } else { c }
        })
        .collect()
}

/// Fix common OCR confusions: `'11` for `'ll`, `'1` for `'t`, `b` for `h`
/// in frequent words, `1` inside lowercase words and `0` inside upper-case words.
pub fn correct_ocr(text: &str) -> String {
    let text = APOSTROPHE_LL.replace_all(text, "$1'll");
    let text = APOSTROPHE_NT.replace_all(&text, "$1't");
    let text = TH_WH_WORDS.replace_all(&text, |caps: &Captures| {
        let word = &caps[0];
        // The confused letter is always the second one.
        format!("{}h{}", &word[..1], &word[2..])
    });
    let text = replace_between(&text, '1', 'l', |c| c.is_ascii_lowercase());
    replace_between(&text, '0', 'O', |c| c.is_ascii_uppercase())
}

/// Remove revision stamps, scene-number lines, page markers and trailing page numbers
pub fn strip_artifacts(text: &str) -> String {
    to_fixpoint(text, |t| {
        let t = REVISION_STAMP.replace_all(t, "");
        let t = SCENE_NUMBER_LINE.replace_all(&t, "");
        let t = PAGE_MARKER.replace_all(&t, "");
        let t = TRAILING_NUMBER_AFTER_PUNCT.replace_all(&t, "$1");
        let t = TRAILING_NUMBER_WIDE_GAP.replace_all(&t, "");
        t.trim().to_string()
    })
}

/// Remove `<<` and `>>` translation markers together with the whitespace hugging them
pub fn strip_translation_markers(text: &str) -> String {
    to_fixpoint(text, |t| TRANSLATION_MARKER.replace_all(t, "").trim().to_string())
}

/// Collapse every whitespace run to one space and trim
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Full cleanup for a dialogue string
pub fn normalize_text(text: &str) -> String {
    to_fixpoint(text, |t| {
        let t = strip_translation_markers(t);
        let t = correct_ocr(&t);
        let t = strip_artifacts(&t);
        collapse_whitespace(&t)
    })
}

/// Canonical character name: annotations removed, upper-cased,
/// surrounding punctuation trimmed, whitespace collapsed
pub fn normalize_character(name: &str) -> String {
    to_fixpoint(name, |n| {
        let n = PAREN_ANNOTATION.replace_all(n, "");
        let n = correct_ocr(&n).to_uppercase();
        let n = CONTINUATION_SUFFIX.replace_all(&n, "");
        let n = collapse_whitespace(&n);
        n.trim_matches(|c: char| !c.is_alphanumeric()).to_string()
    })
}

/// Normalize both fields of a line, discarding it if either becomes empty
pub fn normalize_line(line: &DialogueLine) -> Option<DialogueLine> {
    DialogueLine::new(normalize_character(&line.character), normalize_text(&line.text))
}

/// Normalize every line of a document, recomputing its roster
pub fn normalize_document(doc: &ScriptDocument) -> ScriptDocument {
    doc.with_lines(doc.lines().iter().filter_map(normalize_line).collect())
}

/// Split a trailing upper-case character name off a dialogue string.
///
/// OCR output sometimes glues the next cue onto the end of the previous
/// speech ("I'll be right back. DONKEY"). Only names following sentence
/// punctuation and not made of common words are split.
pub fn detect_character_at_end(text: &str) -> (String, Option<String>) {
    let Some(caps) = CHARACTER_AT_END.captures(text) else {
        return (text.to_string(), None);
    };
    let Some(whole) = caps.get(0) else {
        return (text.to_string(), None);
    };
    let candidate = caps[1].trim();
    let words: Vec<&str> = candidate.split_whitespace().collect();
    if words.is_empty() || words.len() > 3 {
        return (text.to_string(), None);
    }
    if NON_NAMES.contains(candidate) || words.iter().any(|w| NON_NAMES.contains(w)) {
        return (text.to_string(), None);
    }
    let before = text[..whole.start()].trim();
    let ends_sentence = before.ends_with(['.', '!', '?']);
    if before.chars().count() > 5 && ends_sentence {
        return (before.to_string(), Some(candidate.to_string()));
    }
    (text.to_string(), None)
}
