/*!
 * Lenient JSON recovery for model output.
 *
 * Models wrap JSON in prose or code fences and sometimes stop mid-object
 * when they hit their output limit. Recovery tries, in order: the whole
 * response, the first fenced block, and everything from the first `{`.
 * A truncated candidate is cut back to its last complete array element
 * and closed with the brackets that were still open.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::errors::ParseError;

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)(?:\s*```|$)").unwrap());

/// Recovered JSON and whether it needed repair
#[derive(Debug, Clone, PartialEq)]
pub struct Recovered {
    pub value: Value,
    pub repaired: bool,
}

/// First complete JSON value in `text`, ignoring anything after it
fn parse_leading(text: &str) -> Option<Value> {
    serde_json::Deserializer::from_str(text).into_iter::<Value>().next()?.ok()
}

/// Cut `text` back to its last complete array element and close every open
/// container. Returns `None` when nothing complete precedes the truncation.
pub fn repair_truncated(text: &str) -> Option<String> {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    // (byte offset to cut at, open containers at that point)
    let mut checkpoint: Option<(usize, Vec<char>)> = None;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => stack.push(c),
            '}' | ']' => {
                stack.pop();
                if stack.is_empty() {
                    // the document closed: nothing is truncated
                    return None;
                }
                checkpoint = Some((i + 1, stack.clone()));
            }
            ',' if stack.last() == Some(&'[') => checkpoint = Some((i, stack.clone())),
            _ => {}
        }
    }

    let (cut, open) = checkpoint?;
    let mut repaired = text[..cut].trim_end().trim_end_matches(',').to_string();
    for opener in open.iter().rev() {
        repaired.push(if *opener == '{' { '}' } else { ']' });
    }
    Some(repaired)
}

fn parse_candidate(candidate: &str) -> Option<Recovered> {
    if let Some(value) = parse_leading(candidate) {
        return Some(Recovered { value, repaired: false });
    }
    let repaired = repair_truncated(candidate)?;
    parse_leading(&repaired).map(|value| Recovered { value, repaired: true })
}

/// Locate and parse the JSON object in a model response
pub fn recover_json(response: &str) -> Result<Recovered, ParseError> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return Err(ParseError::InvalidJson("empty response".to_string()));
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(Recovered { value, repaired: false });
    }

    if let Some(block) = FENCED_BLOCK.captures(trimmed).and_then(|c| c.get(1)) {
        if let Some(recovered) = parse_candidate(block.as_str().trim()) {
            return Ok(recovered);
        }
    }

    let Some(start) = trimmed.find('{') else {
        return Err(ParseError::InvalidJson(preview(trimmed)));
    };
    parse_candidate(&trimmed[start..]).ok_or_else(|| ParseError::Unrepairable(preview(trimmed)))
}

fn preview(text: &str) -> String {
    text.chars().take(200).collect()
}
