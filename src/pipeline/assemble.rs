//! Page Text assembly from engine detections.

use crate::engine::TextRegion;

/// Join a page's recognized regions into its Page Text.
///
/// Every region with non-empty text contributes that text followed by a
/// single `\n`, in the order the engine returned it. Regions without text are
/// skipped, so no detections at all yields `""`.
pub fn page_text(regions: &[TextRegion]) -> String {
    let mut text = String::new();
    for line in regions.iter().filter_map(TextRegion::non_empty_text) {
        text.push_str(line);
        text.push('\n');
    }
    text
}
