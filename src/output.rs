//! Pipeline output: Document Text and the plain-text export artifact.

use serde::{Deserialize, Serialize};

/// Marker placed between pages in the export artifact.
pub const PAGE_BREAK: &str = "\n\n--- PAGE BREAK ---\n\n";

/// Default filename offered for the export artifact.
pub const EXPORT_FILENAME: &str = "technocrafts_solar_panel_ocr.txt";

/// MIME type of the export artifact.
pub const EXPORT_MIME: &str = "text/plain; charset=utf-8";

/// Ordered per-page OCR text for one document.
///
/// `pages[i]` is the Page Text of page `i + 1`. The vector always has exactly
/// one entry per page of the source PDF; a page without detections holds `""`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentText {
    /// Page Text values, index-aligned with the document's pages.
    pub pages: Vec<String>,
    /// Timing and detection counters.
    pub stats: ProcessingStats,
}

impl DocumentText {
    /// Number of pages in the source document.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Page Text for a 1-based page number, as shown in the page selector.
    pub fn page(&self, page_num: usize) -> Option<&str> {
        page_num
            .checked_sub(1)
            .and_then(|idx| self.pages.get(idx))
            .map(String::as_str)
    }

    /// True when a page's text is empty after trimming whitespace.
    ///
    /// Out-of-range page numbers are reported as blank.
    pub fn is_blank(&self, page_num: usize) -> bool {
        self.page(page_num).is_none_or(|t| t.trim().is_empty())
    }

    /// Assemble the downloadable plain-text artifact.
    ///
    /// Each page is prefixed `PAGE {n}:` and pages are separated by
    /// [`PAGE_BREAK`]:
    ///
    /// ```text
    /// PAGE 1:
    /// <page 1 text>
    ///
    /// --- PAGE BREAK ---
    ///
    /// PAGE 2:
    /// <page 2 text>
    /// ```
    pub fn export(&self) -> String {
        self.pages
            .iter()
            .enumerate()
            .map(|(i, text)| format!("PAGE {}:\n{}", i + 1, text))
            .collect::<Vec<_>>()
            .join(PAGE_BREAK)
    }
}

/// Counters collected while processing one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingStats {
    pub total_duration_ms: u64,
    pub render_duration_ms: u64,
    pub ocr_duration_ms: u64,
    /// Regions returned by the engine across all pages, including empty ones.
    pub regions_detected: usize,
    /// Pages whose text is empty after trimming.
    pub blank_pages: usize,
}
