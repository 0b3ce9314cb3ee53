//! Error types for the drawing-ocr library.
//!
//! Two error types reflect two layers of failure:
//!
//! * [`DrawingOcrError`]: **fatal** for the document. The upload is not a
//!   PDF, a page could not be rendered, or the OCR engine failed on a page.
//!   Returned as `Err(DrawingOcrError)` from [`crate::PagePipeline::process`];
//!   no partial Document Text is ever returned alongside it.
//!
//! * [`EngineError`]: raised by an [`crate::engine::OcrEngine`] backend for a
//!   single image. The pipeline wraps it in [`DrawingOcrError::OcrEngine`]
//!   together with the 1-based page number it failed on.
//!
//! A page on which the engine detects nothing is *not* an error: it yields an
//! empty Page Text.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the drawing-ocr library.
#[derive(Debug, Error)]
pub enum DrawingOcrError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The uploaded bytes are not a parseable PDF.
    #[error("Upload is not a valid PDF: {detail}")]
    DocumentFormat { detail: String },

    /// The document has no pages at all.
    #[error("PDF contains no pages")]
    EmptyDocument,

    /// The document exceeds the configured page limit.
    #[error("PDF has {pages} pages; at most {max} pages are processed per upload")]
    TooManyPages { pages: usize, max: usize },

    // ── Processing errors ─────────────────────────────────────────────────
    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// The OCR engine failed on a specific page; the whole document is aborted.
    #[error("OCR engine failed on page {page}: {source}")]
    OcrEngine {
        page: usize,
        #[source]
        source: EngineError,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create, write or remove the transient copy of the upload.
    #[error("Temporary storage error at '{path}': {source}")]
    TempStorage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDFium is normally downloaded automatically on first run.\n\
If the auto-download failed, you can:\n\
  • Check your internet connection and try again.\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DrawingOcrError {
    /// Stable machine-readable code used in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            DrawingOcrError::DocumentFormat { .. } => "DOCUMENT_FORMAT",
            DrawingOcrError::EmptyDocument => "EMPTY_DOCUMENT",
            DrawingOcrError::TooManyPages { .. } => "TOO_MANY_PAGES",
            DrawingOcrError::RasterisationFailed { .. } => "RASTERISATION_FAILED",
            DrawingOcrError::OcrEngine { .. } => "OCR_ENGINE",
            DrawingOcrError::TempStorage { .. } => "TEMP_STORAGE",
            DrawingOcrError::InvalidConfig(_) => "INVALID_CONFIG",
            DrawingOcrError::PdfiumBindingFailed(_) => "PDFIUM_UNAVAILABLE",
            DrawingOcrError::Internal(_) => "INTERNAL",
        }
    }

    /// True when the failure lies with the uploaded document rather than the server.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            DrawingOcrError::DocumentFormat { .. }
                | DrawingOcrError::EmptyDocument
                | DrawingOcrError::TooManyPages { .. }
        )
    }
}

/// A failure inside an OCR backend for one image.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The backend cannot run at all (binary missing, provider not configured).
    #[error("OCR backend '{engine}' is unavailable: {hint}")]
    Unavailable { engine: String, hint: String },

    /// The backend ran and reported a failure.
    #[error("{0}")]
    Failed(String),

    /// The backend produced output that could not be interpreted.
    #[error("Malformed OCR output: {0}")]
    MalformedOutput(String),

    /// The page image could not be encoded for the backend.
    #[error("Image encoding failed: {0}")]
    ImageEncoding(#[from] image::ImageError),

    /// I/O while talking to the backend.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
