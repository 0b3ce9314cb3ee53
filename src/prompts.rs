//! System prompt for the vision OCR backend.
//!
//! Kept in its own module so tests can inspect it and so callers can see
//! exactly what the model is asked to do. Override it with
//! [`crate::engine::vision::VisionConfig::system_prompt`].

use crate::engine::postprocess::NO_TEXT_SENTINEL;

/// Default transcription prompt for one rasterised drawing sheet.
///
/// The reply format mirrors what the Tesseract backend produces: one
/// recognized text line per output line, top-to-bottom then left-to-right.
pub const DEFAULT_OCR_PROMPT: &str = r#"You are an OCR engine reading a scanned engineering drawing of a solar panel installation.

Transcribe every piece of legible text on the page image.

1. COVERAGE
   - Include title blocks, labels, dimensions, callouts, tables, notes and legends
   - Include rotated text, reading it in its natural direction
   - Keep units, symbols and part numbers exactly as printed

2. ORDER
   - One text line per output line
   - Read top-to-bottom, then left-to-right
   - Each table row is one line, cells separated by a single space

3. FIDELITY
   - Do NOT correct spelling, expand abbreviations or translate
   - Do NOT describe drawings, arrows or symbols that carry no text
   - Skip text you cannot read rather than guessing

4. OUTPUT FORMAT
   - Output ONLY the transcribed lines
   - Do NOT wrap the reply in code fences
   - Do NOT add commentary, headings or numbering
   - If the page has no legible text, reply with exactly: NO_TEXT"#;

/// Returns the prompt to send, honouring an optional override.
pub fn system_prompt(override_prompt: Option<&str>) -> &str {
    override_prompt
        .filter(|p| !p.trim().is_empty())
        .unwrap_or(DEFAULT_OCR_PROMPT)
}
