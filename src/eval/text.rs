// src/eval/text.rs

//! Small text helpers shared by checks and catalog tooling.

use std::sync::LazyLock;

use regex::Regex;

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("constant regex pattern is valid"));

/// Collapse every whitespace run to a single space and trim the ends.
pub fn normalize_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Replace every closed ```` ``` ```` block with a single space.
///
/// An unterminated fence is left alone.
pub fn strip_fenced_code(input: &str) -> String {
    FENCED_BLOCK.replace_all(input, " ").into_owned()
}

/// Whether `input` contains at least one closed fenced code block.
pub fn has_fenced_code(input: &str) -> bool {
    FENCED_BLOCK.is_match(input)
}

/// Words outside fenced code blocks; a word is a run of non-whitespace.
pub fn count_words(input: &str) -> usize {
    strip_fenced_code(input).split_whitespace().count()
}

/// Lower-cased alphanumeric tokens of at least four characters.
pub fn keywords_from_topic(topic: &str) -> Vec<String> {
    topic
        .to_lowercase()
        .split(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit()))
        .filter(|t| t.len() >= 4)
        .map(str::to_string)
        .collect()
}

/// `"Flexbox & Grid: Layouts!"` -> `"flexbox-grid-layouts"`.
pub fn slugify(input: &str) -> String {
    let lower = input.to_lowercase();
    let mut out = String::with_capacity(lower.len());
    let mut pending_dash = false;
    for c in lower.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c);
        } else {
            pending_dash = true;
        }
    }
    out
}
