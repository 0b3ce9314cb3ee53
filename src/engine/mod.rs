//! OCR engine seam.
//!
//! The page pipeline never talks to an OCR backend directly; it holds an
//! `Arc<dyn OcrEngine>` built once at startup and calls
//! [`OcrEngine::recognize`] for each rendered page. Backends:
//!
//! * [`tesseract`]: runs the `tesseract` CLI and parses its TSV output into
//!   line-level regions with bounding boxes and confidences.
//! * [`vision`]: asks a vision LLM to transcribe the page line by line.
//!
//! Test code plugs in its own implementations.

use crate::error::EngineError;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tesseract::{TesseractConfig, TesseractEngine};
use vision::{VisionConfig, VisionEngine};

pub mod postprocess;
pub mod tesseract;
pub mod vision;

/// Axis-aligned pixel rectangle of a detected region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// Smallest rectangle covering both `self` and `other`.
    pub fn union(&self, other: &Region) -> Region {
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);
        let right = (self.left + self.width).max(other.left + other.width);
        let bottom = (self.top + self.height).max(other.top + other.height);
        Region {
            left,
            top,
            width: right - left,
            height: bottom - top,
        }
    }
}

/// One detected text region, in the order the engine returned it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextRegion {
    /// Recognized text. `None` or empty when detection found a region but
    /// recognition produced nothing.
    pub text: Option<String>,
    /// Recognition confidence in `[0, 1]`, when the backend reports one.
    pub confidence: Option<f32>,
    /// Location on the page image, when the backend reports one.
    pub bounds: Option<Region>,
}

impl TextRegion {
    /// Region with text only.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Non-empty recognized text, if any.
    pub fn non_empty_text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.is_empty())
    }
}

/// A text detection + recognition backend.
///
/// `recognize` is blocking: the pipeline calls it from Tokio's blocking pool,
/// one page at a time, in page order.
pub trait OcrEngine: Send + Sync {
    /// Short identifier reported by `/health` and in logs.
    fn name(&self) -> &'static str;

    /// Detect and recognize text on one page image.
    ///
    /// An empty vector means nothing was detected; that is not an error.
    fn recognize(&self, image: &RgbImage) -> Result<Vec<TextRegion>, EngineError>;
}

/// Selectable OCR backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Local `tesseract` binary (default).
    #[default]
    Tesseract,
    /// Vision LLM via edgequake-llm.
    Vision,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Tesseract => f.write_str("tesseract"),
            EngineKind::Vision => f.write_str("vision"),
        }
    }
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tesseract" => Ok(EngineKind::Tesseract),
            "vision" | "vlm" | "llm" => Ok(EngineKind::Vision),
            other => Err(format!(
                "unknown OCR engine '{other}' (expected tesseract or vision)"
            )),
        }
    }
}

/// Construct the selected backend.
///
/// The vision backend must be built inside a Tokio runtime.
pub fn build_engine(
    kind: EngineKind,
    tesseract: TesseractConfig,
    vision: VisionConfig,
) -> Result<Arc<dyn OcrEngine>, EngineError> {
    match kind {
        EngineKind::Tesseract => Ok(Arc::new(TesseractEngine::new(tesseract)?)),
        EngineKind::Vision => Ok(Arc::new(VisionEngine::new(vision)?)),
    }
}
