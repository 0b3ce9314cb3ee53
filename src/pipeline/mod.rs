//! The page pipeline: PDF bytes in, per-page OCR text out.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ engine ──▶ assemble
//! (stage)   (pdfium)   (RGB)      (OCR)      (Page Text)
//! ```
//!
//! 1. [`input`]   : check the PDF header and stage the bytes in a temp file
//! 2. [`render`]  : rasterise one page at `dpi / 72` scale
//! 3. [`encode`]  : flatten to an RGB pixel matrix
//! 4. the [`OcrEngine`] detects and recognizes text regions
//! 5. [`assemble`]: join region texts into the page's Page Text
//!
//! Pages run strictly in order, one at a time. The first page that fails
//! aborts the document; no partial result is returned.

pub mod assemble;
pub mod encode;
pub mod input;
pub mod render;

use crate::config::PipelineConfig;
use crate::engine::OcrEngine;
use crate::error::DrawingOcrError;
use crate::output::{DocumentText, ProcessingStats};
use crate::progress::{NoopProgress, PipelineProgress};
use input::TransientDocument;
use render::Rasterizer;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Turns an uploaded PDF into [`DocumentText`].
///
/// Built once at startup and shared behind an `Arc`; the rasterizer and OCR
/// engine are injected so tests can substitute fakes.
pub struct PagePipeline {
    config: PipelineConfig,
    rasterizer: Arc<dyn Rasterizer>,
    engine: Arc<dyn OcrEngine>,
}

impl PagePipeline {
    pub fn new(
        config: PipelineConfig,
        rasterizer: Arc<dyn Rasterizer>,
        engine: Arc<dyn OcrEngine>,
    ) -> Self {
        Self {
            config,
            rasterizer,
            engine,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Name of the injected OCR engine.
    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Run the whole pipeline on one upload. Blocking.
    ///
    /// Returns one Page Text per page of the document, in page order. The
    /// staged copy of the upload is gone by the time this returns, whatever
    /// the outcome.
    pub fn process(&self, pdf_bytes: &[u8]) -> Result<DocumentText, DrawingOcrError> {
        let start = Instant::now();
        let staged = TransientDocument::stage(pdf_bytes, self.config.temp_dir.as_deref())?;

        let mut document = self.run(staged.path())?;

        if let Err(e) = staged.release() {
            warn!("Could not remove staged upload: {}", e);
        }

        document.stats.total_duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "OCR finished: {} pages ({} blank) in {}ms",
            document.page_count(),
            document.stats.blank_pages,
            document.stats.total_duration_ms
        );
        Ok(document)
    }

    /// Run [`process`](Self::process) on Tokio's blocking pool.
    pub async fn process_async(
        self: &Arc<Self>,
        pdf_bytes: Vec<u8>,
    ) -> Result<DocumentText, DrawingOcrError> {
        self.process_holding(pdf_bytes, ()).await
    }

    /// Like [`process_async`](Self::process_async), but `guard` is dropped
    /// only when the blocking run ends.
    ///
    /// The blocking task outlives a cancelled caller, so an admission permit
    /// passed here stays held for as long as the document is really being
    /// processed.
    pub async fn process_holding<G: Send + 'static>(
        self: &Arc<Self>,
        pdf_bytes: Vec<u8>,
        guard: G,
    ) -> Result<DocumentText, DrawingOcrError> {
        let pipeline = Arc::clone(self);
        tokio::task::spawn_blocking(move || {
            let result = pipeline.process(&pdf_bytes);
            drop(guard);
            result
        })
        .await
        .map_err(|e| DrawingOcrError::Internal(format!("OCR task panicked: {}", e)))?
    }

    fn progress(&self) -> &dyn PipelineProgress {
        self.config
            .progress_callback
            .as_deref()
            .unwrap_or(&NoopProgress as &dyn PipelineProgress)
    }

    fn run(&self, pdf_path: &Path) -> Result<DocumentText, DrawingOcrError> {
        let progress = self.progress();
        let scale = self.config.render_scale();
        let max_pages = self.config.max_pages;

        let mut pages: Vec<String> = Vec::new();
        let mut stats = ProcessingStats::default();

        self.rasterizer.with_document(pdf_path, &mut |source| {
            let total = source.page_count();
            if total == 0 {
                return Err(DrawingOcrError::EmptyDocument);
            }
            if total > max_pages {
                return Err(DrawingOcrError::TooManyPages {
                    pages: total,
                    max: max_pages,
                });
            }

            progress.on_document_start(total);
            pages.reserve_exact(total);

            for index in 0..total {
                let page_num = index + 1;
                progress.on_page_start(page_num, total);

                let render_start = Instant::now();
                let rendered = source.render(index, scale).inspect_err(|e| {
                    progress.on_page_error(page_num, total, &e.to_string());
                })?;
                let pixels = encode::to_pixels(rendered);
                stats.render_duration_ms += render_start.elapsed().as_millis() as u64;

                let ocr_start = Instant::now();
                let regions = self.engine.recognize(&pixels).map_err(|err| {
                    progress.on_page_error(page_num, total, &err.to_string());
                    DrawingOcrError::OcrEngine {
                        page: page_num,
                        source: err,
                    }
                })?;
                stats.ocr_duration_ms += ocr_start.elapsed().as_millis() as u64;
                stats.regions_detected += regions.len();

                let text = assemble::page_text(&regions);
                if text.trim().is_empty() {
                    stats.blank_pages += 1;
                }
                debug!(
                    "Page {}/{}: {} regions, {} chars",
                    page_num,
                    total,
                    regions.len(),
                    text.len()
                );
                progress.on_page_complete(page_num, total, text.len());
                pages.push(text);
            }

            progress.on_document_complete(total, stats.blank_pages);
            Ok(())
        })?;

        Ok(DocumentText { pages, stats })
    }
}
