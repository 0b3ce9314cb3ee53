//! PDF rasterisation behind the [`Rasterizer`] seam.
//!
//! pdfium documents borrow the library binding that loaded them, so the
//! rasterizer does not hand documents out. Instead [`Rasterizer::with_document`]
//! opens the file, passes a [`PageSource`] to the caller's visitor, and closes
//! the document when the visitor returns. Pages are rendered one at a
//! time, so only one page bitmap is alive at any moment.
//!
//! ## Why cap pixels as well as DPI?
//!
//! Drawing sheets range from A4 to A0. At 300 DPI an oversized sheet can
//! exceed what an OCR engine will accept; `max_rendered_pixels` bounds the
//! longest edge regardless of physical size.

use crate::error::DrawingOcrError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Pages of one open document.
pub trait PageSource {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// Render the page at 0-based `index`, scaling PDF points by `scale`.
    fn render(&mut self, index: usize, scale: f32) -> Result<DynamicImage, DrawingOcrError>;
}

/// Opens PDF files and exposes their pages for rendering.
pub trait Rasterizer: Send + Sync {
    /// Open `path` and run `visit` against its pages.
    ///
    /// Fails with [`DrawingOcrError::DocumentFormat`] when the file cannot be
    /// parsed as a PDF.
    fn with_document(
        &self,
        path: &Path,
        visit: &mut dyn FnMut(&mut dyn PageSource) -> Result<(), DrawingOcrError>,
    ) -> Result<(), DrawingOcrError>;
}

/// Rasterizer backed by the pdfium C++ library.
///
/// pdfium is initialised when the library is bound and torn down when the
/// binding is dropped, for the whole process. The binding is therefore made
/// once here and shared by every document; clones share it too.
#[derive(Clone)]
pub struct PdfiumRasterizer {
    pdfium: Arc<Pdfium>,
    max_rendered_pixels: u32,
}

impl fmt::Debug for PdfiumRasterizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfiumRasterizer")
            .field("pdfium", &"<bound>")
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .finish()
    }
}

impl PdfiumRasterizer {
    /// Bind the library at `path`.
    pub fn from_library(
        path: impl AsRef<Path>,
        max_rendered_pixels: u32,
    ) -> Result<Self, DrawingOcrError> {
        let pdfium = pdfium_auto::bind_pdfium_from_path(path.as_ref())
            .map_err(|e| DrawingOcrError::PdfiumBindingFailed(e.to_string()))?;
        Ok(Self::with_pdfium(Arc::new(pdfium), max_rendered_pixels))
    }

    /// Bind whichever pdfium the dynamic loader finds.
    pub fn system(max_rendered_pixels: u32) -> Result<Self, DrawingOcrError> {
        let bindings = Pdfium::bind_to_system_library()
            .map_err(|e| DrawingOcrError::PdfiumBindingFailed(format!("{e:?}")))?;
        Ok(Self::with_pdfium(Arc::new(Pdfium::new(bindings)), max_rendered_pixels))
    }

    /// Share an existing binding.
    pub fn with_pdfium(pdfium: Arc<Pdfium>, max_rendered_pixels: u32) -> Self {
        Self {
            pdfium,
            max_rendered_pixels,
        }
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn with_document(
        &self,
        path: &Path,
        visit: &mut dyn FnMut(&mut dyn PageSource) -> Result<(), DrawingOcrError>,
    ) -> Result<(), DrawingOcrError> {
        let document = self
            .pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| classify_load_error(&format!("{e:?}")))?;

        let mut pages = PdfiumPages {
            document: &document,
            max_pixels: self.max_rendered_pixels,
        };
        info!("PDF loaded: {} pages", pages.page_count());
        visit(&mut pages)
    }
}

struct PdfiumPages<'d, 'p> {
    document: &'d PdfDocument<'p>,
    max_pixels: u32,
}

impl PageSource for PdfiumPages<'_, '_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn render(&mut self, index: usize, scale: f32) -> Result<DynamicImage, DrawingOcrError> {
        let page_num = index + 1;
        let page_index = u16::try_from(index).map_err(|_| DrawingOcrError::RasterisationFailed {
            page: page_num,
            detail: "page index out of range".to_string(),
        })?;

        let page = self.document.pages().get(page_index).map_err(|e| {
            DrawingOcrError::RasterisationFailed {
                page: page_num,
                detail: format!("{e:?}"),
            }
        })?;

        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(scale)
            .set_maximum_width(self.max_pixels as i32)
            .set_maximum_height(self.max_pixels as i32);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| DrawingOcrError::RasterisationFailed {
                page: page_num,
                detail: format!("{e:?}"),
            })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            page_num,
            image.width(),
            image.height()
        );
        Ok(image)
    }
}

/// Map a pdfium load failure onto a user-facing format error.
fn classify_load_error(detail: &str) -> DrawingOcrError {
    if detail.contains("assword") {
        DrawingOcrError::DocumentFormat {
            detail: "document is encrypted and requires a password".to_string(),
        }
    } else {
        DrawingOcrError::DocumentFormat {
            detail: format!("pdfium could not open the document: {detail}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_errors_mention_encryption() {
        let err = classify_load_error("PdfiumLibraryInternalError(PasswordError)");
        assert!(err.to_string().contains("encrypted"));
        assert!(err.is_rejection());
    }

    #[test]
    fn other_load_errors_are_format_errors() {
        let err = classify_load_error("PdfiumLibraryInternalError(FormatError)");
        assert_eq!(err.code(), "DOCUMENT_FORMAT");
        assert!(err.to_string().contains("FormatError"));
    }

    #[test]
    fn missing_library_fails_to_bind() {
        let err = PdfiumRasterizer::from_library("/nonexistent/libpdfium.so", 1000).unwrap_err();
        assert!(matches!(err, DrawingOcrError::PdfiumBindingFailed(_)));
    }
}
