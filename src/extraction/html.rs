/*!
 * HTML screenplay extraction.
 *
 * Four readings of an HTML page are offered:
 * - role mode: pages that tag each element as speaker / dialogue / slug / direction
 * - layout walk: text lines with boldness and leading-whitespace indent
 * - preformatted text: the verbatim contents of every `<pre>`
 * - wiki transcript: the main content block of a MediaWiki/Fandom page
 */

use std::collections::HashSet;

use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

use crate::document::TextElement;

/// Role mode needs at least this many speaker elements
const MIN_ROLE_SPEAKERS: usize = 3;
const MAX_DEPTH: usize = 100;
const TAB_WIDTH: usize = 8;

pub const SPEAKER_INDENT: usize = 37;
pub const DIALOGUE_INDENT: usize = 25;
pub const DIRECTION_INDENT: usize = 31;

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "li", "dd", "dt", "dl", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "tr", "table",
    "blockquote", "section", "article", "main", "hr",
];

const WIKI_CHROME: &str = "script, style, #toc, .toc, .navbox, .navigation-box, .portable-infobox, .infobox, \
     .categories, .page-footer, .page-header, .page-header__categories, .printfooter, .mw-editsection, \
     .noprint, .reference, table";

const WIKI_CONTENT: &[&str] = &[
    ".mw-parser-output",
    ".mw-content-text",
    "#mw-content-text",
    ".page-content",
    "main",
    "#content",
    "body",
];

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Undo common Windows-1252 residue before structured parsing
pub fn preprocess(html: &str) -> String {
    html.replace('\u{92}', "'")
        .replace(['\u{93}', '\u{94}'], "\"")
        .replace("&amp;", "&")
}

fn direct_text(element: ElementRef) -> String {
    let parts: Vec<&str> = element
        .children()
        .filter_map(|child| match child.value() {
            Node::Text(text) => {
                let text: &str = text;
                let text = text.trim();
                (!text.is_empty()).then_some(text)
            }
            _ => None,
        })
        .collect();
    parts.join(" ")
}

/// Map role-tagged elements to canonical-indent text elements.
/// Returns `None` when the page does not carry enough role markup.
pub fn extract_roles(html: &str) -> Option<Vec<TextElement>> {
    let document = Html::parse_document(&preprocess(html));
    let speakers = selector("#speaker")?;
    if document.select(&speakers).count() < MIN_ROLE_SPEAKERS {
        return None;
    }

    let roles = selector("#speaker, #dia, #slug, #act, #spkdir")?;
    let elements = document
        .select(&roles)
        .filter_map(|element| {
            let text = direct_text(element);
            if text.is_empty() {
                return None;
            }
            let role = element.value().id().unwrap_or_default().to_ascii_lowercase();
            match role.as_str() {
                "speaker" => Some(TextElement::new(text, true, SPEAKER_INDENT)),
                "dia" => Some(TextElement::new(text, false, DIALOGUE_INDENT)),
                "slug" => Some(TextElement::new(text, true, 0)),
                "act" => Some(TextElement::new(text, false, 0)),
                "spkdir" => Some(TextElement::new(format!("({})", text), false, DIRECTION_INDENT)),
                _ => None,
            }
        })
        .collect();
    Some(elements)
}

/// Accumulates text fragments into indented lines
#[derive(Default)]
struct LineBuilder {
    current: String,
    bold: bool,
    lines: Vec<TextElement>,
}

impl LineBuilder {
    fn push_text(&mut self, text: &str, bold: bool) {
        let mut parts = text.split('\n');
        if let Some(first) = parts.next() {
            self.append(first, bold);
        }
        for part in parts {
            self.break_line();
            self.append(part, bold);
        }
    }

    fn append(&mut self, fragment: &str, bold: bool) {
        let fragment = fragment.replace('\u{a0}', " ").replace('\r', "");
        if bold && !fragment.trim().is_empty() {
            self.bold = true;
        }
        self.current.push_str(&fragment);
    }

    fn break_line(&mut self) {
        let line = std::mem::take(&mut self.current);
        let bold = std::mem::replace(&mut self.bold, false);
        let expanded = line.replace('\t', &" ".repeat(TAB_WIDTH));
        let content = expanded.trim();
        if content.is_empty() {
            // collapse runs of blank lines into one separator
            if self.lines.last().is_none_or(|last| !last.is_blank()) {
                self.lines.push(TextElement::new("", false, 0));
            }
            return;
        }
        let indent = expanded.len() - expanded.trim_start().len();
        self.lines.push(TextElement::new(content, bold, indent));
    }

    fn finish(mut self) -> Vec<TextElement> {
        self.break_line();
        while self.lines.first().is_some_and(|l| l.is_blank()) {
            self.lines.remove(0);
        }
        while self.lines.last().is_some_and(|l| l.is_blank()) {
            self.lines.pop();
        }
        self.lines
    }
}

fn walk_node(element: ElementRef, bold: bool, depth: usize, skip: &dyn Fn(&ElementRef) -> bool, out: &mut LineBuilder) {
    if depth > MAX_DEPTH {
        return;
    }
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_text(text, bold),
            Node::Element(tag) => {
                let Some(child_ref) = ElementRef::wrap(child) else {
                    continue;
                };
                let name = tag.name();
                if name == "script" || name == "style" || skip(&child_ref) {
                    continue;
                }
                if name == "br" {
                    out.break_line();
                    continue;
                }
                let role = tag.id().unwrap_or_default().to_ascii_lowercase();
                let child_bold = bold || name == "b" || name == "strong" || role == "speaker" || role == "slug";
                let block = BLOCK_TAGS.contains(&name);
                if block {
                    out.break_line();
                }
                walk_node(child_ref, child_bold, depth + 1, skip, out);
                if block {
                    out.break_line();
                }
            }
            _ => {}
        }
    }
}

/// Walk the first `<pre>` (or the body) and emit one element per visual line.
/// Blank lines survive as blank elements so paragraph boundaries stay visible.
pub fn walk(html: &str) -> Vec<TextElement> {
    let document = Html::parse_document(&preprocess(html));
    let root = selector("pre")
        .and_then(|s| document.select(&s).next())
        .or_else(|| selector("body").and_then(|s| document.select(&s).next()))
        .unwrap_or_else(|| document.root_element());

    let mut builder = LineBuilder::default();
    walk_node(root, false, 0, &|_| false, &mut builder);
    builder.finish()
}

/// Verbatim text of every `<pre>` block, or `None` if the page has none
pub fn pre_text(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let pre = selector("pre")?;
    let blocks: Vec<String> = document.select(&pre).map(|e| e.text().collect::<String>()).collect();
    if blocks.is_empty() {
        return None;
    }
    let joined = blocks.join("\n\n");
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Main transcript text of a wiki page with navigation chrome removed
pub fn extract_wiki(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let chrome = selector(WIKI_CHROME)?;
    let chrome_ids: HashSet<_> = document.select(&chrome).map(|e| e.id()).collect();

    let container = WIKI_CONTENT
        .iter()
        .filter_map(|css| selector(css))
        .find_map(|s| document.select(&s).next())?;

    let mut builder = LineBuilder::default();
    walk_node(container, false, 0, &|e| chrome_ids.contains(&e.id()), &mut builder);
    let lines: Vec<String> = builder
        .finish()
        .into_iter()
        .filter(|l| !l.is_blank())
        .map(|l| l.content)
        .collect();
    (!lines.is_empty()).then(|| lines.join("\n"))
}
