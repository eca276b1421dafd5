/*!
 * Prompt templates for the dialogue extraction contract.
 */

/// System instruction shared by every extraction call
pub const EXTRACTION_SYSTEM: &str = r#"You are an expert screenplay parser. Extract every line of spoken dialogue as a flat list.

Respond with valid JSON in exactly this shape:

{
  "title": "movie or show title, if visible",
  "lines": [
    {"character": "CHARACTER_1", "text": "dialogue text"},
    {"character": "CHARACTER_2", "text": "dialogue text"}
  ]
}

Rules:
- Only spoken dialogue: no action, scene headings, transitions or camera directions
- Character names in UPPERCASE with annotations removed ("JOHN (CONT'D)" and "JOHN (V.O.)" are both "JOHN")
- Join dialogue that wraps across several lines into one entry
- Keep the order in which the dialogue appears
- Output the JSON object and nothing else"#;

/// Prompt for the first (or only) chunk of a screenplay
pub fn first_chunk(chunk: &str) -> String {
    format!(
        "Parse this screenplay text and extract all dialogue lines.\n\
         Output valid JSON following the schema provided.\n\n\
         Text:\n{}\n\nJSON output:",
        chunk
    )
}

/// Prompt for chunk `index` (0-based) of `total`
pub fn continuation_chunk(chunk: &str, index: usize, total: usize) -> String {
    format!(
        "Continue parsing this screenplay. This is chunk {} of {}.\n\n\
         Text:\n{}\n\nJSON output:",
        index + 1,
        total,
        chunk
    )
}

/// Prompt for a free-form transcript chunk
pub fn transcript_chunk(chunk: &str) -> String {
    format!(
        "Parse this transcript chunk. Extract all dialogue lines.\n\nText:\n{}\n\nJSON output:",
        chunk
    )
}

/// Prompt accompanying a PDF attachment; `first_page` is 1-based
pub fn document_part(index: usize, first_page: usize) -> String {
    if index == 0 {
        "Analyze this screenplay/transcript PDF and extract all dialogue lines.\n\
         Output valid JSON following the schema provided."
            .to_string()
    } else {
        format!(
            "Continue parsing this screenplay/transcript PDF. This is pages {} onwards.\n\
             Output valid JSON with the dialogue lines from these pages:",
            first_page
        )
    }
}

/// System instruction for script/subtitle fusion
pub const FUSION_SYSTEM: &str = r#"You align screenplay dialogue with subtitle dialogue.

Respond with valid JSON in exactly this shape:

{"lines": [{"character": "CHARACTER", "dialogue": "subtitle text"}]}

Output the JSON object and nothing else."#;

/// Prompt pairing a script with (part of) a subtitle track
pub fn fusion(script: &str, subtitles: &str, index: usize, total: usize) -> String {
    let part = if total > 1 {
        format!(" (subtitle part {} of {})", index + 1, total)
    } else {
        String::new()
    };
    format!(
        "Match the script dialogue to the subtitle dialogue and produce a fused dataset{part}.\n\n\
         SCRIPT:\n{script}\n\n\
         SUBTITLES:\n{subtitles}\n\n\
         Script parsing:\n\
         - Character names are upper-case lines before their dialogue\n\
         - Skip scene headings (INT./EXT.), stage and camera directions, credits\n\n\
         Subtitle parsing:\n\
         - Use only spoken lines; skip timestamps, music, sound effects and actions\n\n\
         Matching:\n\
         - For each subtitle line find the script line it corresponds to\n\
         - Take the CHARACTER from the script and the DIALOGUE text from the subtitle\n\
         - Character names in UPPERCASE without (V.O.) or (CONT'D)\n\
         - Keep subtitle order and include every line you can attribute\n\n\
         JSON output:",
    )
}
