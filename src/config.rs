//! Configuration types for the page pipeline.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. Engine-specific knobs live next to their
//! engines ([`crate::engine::tesseract::TesseractConfig`],
//! [`crate::engine::vision::VisionConfig`]).

use crate::error::DrawingOcrError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;

/// PDF user-space unit: 72 points per inch.
pub const PDF_BASE_DPI: f32 = 72.0;

/// Default rendering resolution. Engineering drawings carry small dimension
/// labels; 300 DPI keeps them legible for OCR.
pub const DEFAULT_DPI: u32 = 300;

/// Configuration for one [`crate::PagePipeline`].
///
/// # Example
/// ```rust
/// use drawing_ocr::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .dpi(200)
///     .max_pages(50)
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 200);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Rendering DPI used when rasterising each page. Range: 72–600. Default: 300.
    ///
    /// The rasterizer scale factor is `dpi / 72`.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 16 000.
    ///
    /// An A0 sheet at 300 DPI is roughly 9 900 × 14 000 px; this cap only
    /// bites on oversized sheets, scaling the other edge proportionally.
    pub max_rendered_pixels: u32,

    /// Maximum number of pages processed per upload. Default: 200.
    pub max_pages: usize,

    /// Directory for the transient copy of the upload. Default: system temp dir.
    pub temp_dir: Option<PathBuf>,

    /// Per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            max_rendered_pixels: 16_000,
            max_pages: 200,
            temp_dir: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("max_pages", &self.max_pages)
            .field("temp_dir", &self.temp_dir)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn PipelineProgress>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Scale factor handed to the rasterizer.
    pub fn render_scale(&self) -> f32 {
        self.dpi as f32 / PDF_BASE_DPI
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = n;
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = Some(dir.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, DrawingOcrError> {
        let c = &self.config;
        if c.max_pages == 0 {
            return Err(DrawingOcrError::InvalidConfig(
                "max_pages must be ≥ 1".into(),
            ));
        }
        if let Some(ref dir) = c.temp_dir {
            if !dir.is_dir() {
                return Err(DrawingOcrError::InvalidConfig(format!(
                    "temp_dir '{}' is not a directory",
                    dir.display()
                )));
            }
        }
        Ok(self.config)
    }
}
