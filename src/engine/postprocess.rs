//! Cleanup of vision-model transcripts before they become text regions.
//!
//! Even when told to reply with plain lines, models occasionally wrap the
//! answer in code fences, emit CRLF line endings, or sprinkle zero-width
//! characters copied from their training data. These rules remove such
//! artefacts without touching the recognized content.
//!
//! Rules (applied in order):
//! 1. Strip outer code fences
//! 2. Normalise line endings (CRLF → LF)
//! 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
//! 4. Trim trailing whitespace per line and drop blank lines
//! 5. Treat the [`NO_TEXT_SENTINEL`] reply as "nothing detected"

use once_cell::sync::Lazy;
use regex::Regex;

/// Reply the prompt asks for when a page carries no legible text.
pub const NO_TEXT_SENTINEL: &str = "NO_TEXT";

/// Turn a raw model reply into ordered, non-empty transcript lines.
pub fn transcript_lines(reply: &str) -> Vec<String> {
    let s = strip_outer_fences(reply);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);

    let lines: Vec<String> = s
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect();

    if lines.len() == 1 && lines[0].trim() == NO_TEXT_SENTINEL {
        return Vec::new();
    }
    lines
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\r?\n(.*?)\r?\n?```\s*$").unwrap());

fn strip_outer_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Strip invisible Unicode ──────────────────────────────────────────

const INVISIBLE: [char; 6] = [
    '\u{200B}', // zero-width space
    '\u{200C}', // zero-width non-joiner
    '\u{200D}', // zero-width joiner
    '\u{2060}', // word joiner
    '\u{FEFF}', // BOM
    '\u{00AD}', // soft hyphen
];

fn remove_invisible_chars(input: &str) -> String {
    input.chars().filter(|c| !INVISIBLE.contains(c)).collect()
}
