//! Narrator response parsing.
//!
//! Models answer with free-form text: a scene, optionally followed by
//! [`OPTIONS_SEPARATOR`] and one player choice per line. Parsing never fails;
//! input without the separator is all narrative.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Token separating the narrative from the options block.
pub const OPTIONS_SEPARATOR: &str = "///OPTIONS///";

static FENCE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^```[a-z]*\s*").unwrap());
static FENCE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```\s*$").unwrap());
static LEADING_ASIDE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[(（][^)）]*[)）]\s*").unwrap());
static LEADING_PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[.…\-—>`~]+").unwrap());
static LIST_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-\d.]+\s*").unwrap());

/// A cleaning step over narrative text.
pub type CleaningStep = fn(&str) -> String;

/// Narrative cleaning pipeline, applied once in this order.
pub const CLEANING_PIPELINE: [(&str, CleaningStep); 4] = [
    ("code_fence", strip_code_fence),
    ("leading_aside", strip_leading_aside),
    ("leading_punctuation", strip_leading_punctuation),
    ("trim", trim),
];

/// Narrative and choices extracted from one model reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedResponse {
    pub narrative: String,
    pub options: Vec<String>,
}

/// Split a raw model reply into cleaned narrative and options.
pub fn parse_response(raw: &str) -> ParsedResponse {
    match raw.split_once(OPTIONS_SEPARATOR) {
        Some((narrative, options)) => ParsedResponse {
            narrative: clean_narrative(narrative),
            options: parse_options(options),
        },
        None => ParsedResponse {
            narrative: clean_narrative(raw),
            options: vec![],
        },
    }
}

/// Run the full cleaning pipeline over narrative text.
pub fn clean_narrative(text: &str) -> String {
    CLEANING_PIPELINE
        .iter()
        .fold(text.to_string(), |acc, (_, step)| step(&acc))
}

/// Parse an options block into ordered, non-empty choices.
pub fn parse_options(block: &str) -> Vec<String> {
    block
        .lines()
        .map(str::trim)
        .map(|line| LIST_MARKER.replace(line, "").into_owned())
        .filter(|line| !line.is_empty())
        .collect()
}

/// Remove a wrapping fenced code block.
pub fn strip_code_fence(text: &str) -> String {
    let opened = FENCE_OPEN.replace(text, "");
    FENCE_CLOSE.replace(&opened, "").into_owned()
}

/// Remove at most one parenthetical aside at the very start.
pub fn strip_leading_aside(text: &str) -> String {
    LEADING_ASIDE.replace(text, "").into_owned()
}

/// Remove a leading run of ellipses, dashes and markup characters.
pub fn strip_leading_punctuation(text: &str) -> String {
    LEADING_PUNCTUATION.replace(text, "").into_owned()
}

fn trim(text: &str) -> String {
    text.trim().to_string()
}
