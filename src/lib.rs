//! # drawing-ocr
//!
//! Extract per-page text from engineering-drawing PDFs (solar panel layouts,
//! single-line diagrams, title blocks) with OCR.
//!
//! ## Why OCR and not text extraction?
//!
//! Drawings exported from CAD tools usually carry their labels as vector
//! strokes or embedded raster scans, not as a text layer. Each page is
//! therefore rasterised at 300 DPI and handed to an OCR engine, which returns
//! the text regions it found in reading order.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Stage     check %PDF- header, write to a transient temp file
//!  ├─ 2. Render    rasterise page i via pdfium at dpi / 72 scale
//!  ├─ 3. Pixels    flatten to 8-bit RGB
//!  ├─ 4. OCR       tesseract (default) or a vision LLM
//!  ├─ 5. Assemble  non-empty region texts, each followed by "\n"
//!  └─ 6. Output    one Page Text per page + export artifact
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use drawing_ocr::engine::tesseract::{TesseractConfig, TesseractEngine};
//! use drawing_ocr::pipeline::render::PdfiumRasterizer;
//! use drawing_ocr::{PagePipeline, PipelineConfig};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::default();
//!     let rasterizer = PdfiumRasterizer::system(config.max_rendered_pixels)?;
//!     let engine = TesseractEngine::new(TesseractConfig::default())?;
//!     let pipeline = PagePipeline::new(config, Arc::new(rasterizer), Arc::new(engine));
//!
//!     let bytes = std::fs::read("drawing.pdf")?;
//!     let document = pipeline.process(&bytes)?;
//!     print!("{}", document.export());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `drawing-ocr` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when embedding the pipeline or the router in another service:
//! ```toml
//! drawing-ocr = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod engine;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod web;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use engine::{EngineKind, OcrEngine, Region, TextRegion};
pub use error::{DrawingOcrError, EngineError};
pub use output::{DocumentText, ProcessingStats};
pub use pipeline::PagePipeline;
pub use progress::{NoopProgress, PipelineProgress, ProgressCallback, TracingProgress};
