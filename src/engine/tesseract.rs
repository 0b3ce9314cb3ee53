//! OCR backend wrapping the `tesseract` CLI.
//!
//! Each page is written to a scratch PNG and recognised with
//! `tesseract <png> stdout tsv`. The TSV output lists one row per word
//! (level 5) together with its block/paragraph/line numbers; words sharing a
//! line are joined back into one [`TextRegion`], which is what the pipeline
//! treats as a "detected region".

use super::{OcrEngine, Region, TextRegion};
use crate::error::EngineError;
use crate::pipeline::encode::encode_png;
use image::RgbImage;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, instrument};

/// Page segmentation mode with orientation and script detection.
const PSM_AUTO_OSD: u8 = 1;
/// Fully automatic page segmentation, no OSD.
const PSM_AUTO: u8 = 3;
/// TSV row level for individual words.
const WORD_LEVEL: &str = "5";

/// Settings for [`TesseractEngine`].
#[derive(Debug, Clone)]
pub struct TesseractConfig {
    /// Path or name of the binary. Default: `tesseract` from `PATH`.
    pub binary: PathBuf,
    /// Language pack(s), `+`-separated. Default: `eng`.
    pub language: String,
    /// Detect rotated text blocks (drawings often carry vertical labels).
    pub auto_rotate: bool,
    /// Explicit `--psm` value, overriding `auto_rotate`.
    pub page_segmentation_mode: Option<u8>,
    /// Resolution hint passed as `--dpi`; should match the render DPI.
    pub dpi: u32,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            auto_rotate: true,
            page_segmentation_mode: None,
            dpi: crate::config::DEFAULT_DPI,
        }
    }
}

impl TesseractConfig {
    fn psm(&self) -> u8 {
        self.page_segmentation_mode.unwrap_or(if self.auto_rotate {
            PSM_AUTO_OSD
        } else {
            PSM_AUTO
        })
    }
}

/// OCR engine backed by a local `tesseract` installation.
#[derive(Debug)]
pub struct TesseractEngine {
    config: TesseractConfig,
    version: String,
}

impl TesseractEngine {
    /// Probe the binary and build the engine.
    ///
    /// Fails with [`EngineError::Unavailable`] when `tesseract --version`
    /// cannot be run, so a misconfigured server refuses to start instead of
    /// failing on the first upload.
    pub fn new(config: TesseractConfig) -> Result<Self, EngineError> {
        let output = Command::new(&config.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| EngineError::Unavailable {
                engine: "tesseract".to_string(),
                hint: format!(
                    "could not run '{}': {e}. Install tesseract-ocr or set --tesseract-bin.",
                    config.binary.display()
                ),
            })?;

        // Older releases print the banner on stderr.
        let banner = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).into_owned()
        } else {
            String::from_utf8_lossy(&output.stdout).into_owned()
        };
        let version = banner.lines().next().unwrap_or("tesseract").trim().to_string();
        debug!(%version, "tesseract available");

        Ok(Self { config, version })
    }

    /// First line of `tesseract --version`.
    pub fn version(&self) -> &str {
        &self.version
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    #[instrument(level = "debug", skip_all, fields(width = image.width(), height = image.height()))]
    fn recognize(&self, image: &RgbImage) -> Result<Vec<TextRegion>, EngineError> {
        let tmpdir = tempfile::TempDir::with_prefix("tesseract")?;
        let input_path = tmpdir.path().join("page.png");
        std::fs::write(&input_path, encode_png(image)?)?;

        let output = Command::new(&self.config.binary)
            .arg(&input_path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.config.language)
            .arg("--psm")
            .arg(self.config.psm().to_string())
            .arg("--dpi")
            .arg(self.config.dpi.to_string())
            .arg("tsv")
            .stdin(Stdio::null())
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Failed(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let regions = parse_tsv(&output.stdout)?;
        debug!(regions = regions.len(), "tesseract recognised page");
        Ok(regions)
    }
}

/// Word row accumulated into a line.
struct LineAccumulator {
    key: (u32, u32, u32, u32),
    words: Vec<String>,
    confidences: Vec<f32>,
    bounds: Option<Region>,
}

impl LineAccumulator {
    fn finish(self) -> TextRegion {
        let confidence = if self.confidences.is_empty() {
            None
        } else {
            let mean = self.confidences.iter().sum::<f32>() / self.confidences.len() as f32;
            Some((mean / 100.0).clamp(0.0, 1.0))
        };
        TextRegion {
            text: Some(self.words.join(" ")),
            confidence,
            bounds: self.bounds,
        }
    }
}

/// Parse `tesseract ... tsv` output into line-level regions.
///
/// Only word rows (level 5) with non-blank text contribute. Lines are
/// returned in the order tesseract emitted them, which is its reading order.
/// Empty output means nothing was detected.
pub fn parse_tsv(tsv: &[u8]) -> Result<Vec<TextRegion>, EngineError> {
    if tsv.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .quoting(false)
        .flexible(true)
        .has_headers(true)
        .from_reader(tsv);

    let headers = reader
        .headers()
        .map_err(|e| EngineError::MalformedOutput(format!("TSV header: {e}")))?;
    if headers.get(0) != Some("level") || headers.len() < 12 {
        return Err(EngineError::MalformedOutput(format!(
            "unexpected TSV header: {:?}",
            headers.iter().collect::<Vec<_>>()
        )));
    }

    let mut regions = Vec::new();
    let mut current: Option<LineAccumulator> = None;

    for (row, record) in reader.records().enumerate() {
        let record =
            record.map_err(|e| EngineError::MalformedOutput(format!("TSV row {}: {e}", row + 1)))?;
        if record.get(0) != Some(WORD_LEVEL) {
            continue;
        }
        let text = record.get(11).unwrap_or("").trim();
        if text.is_empty() {
            continue;
        }

        let field = |idx: usize| -> Result<u32, EngineError> {
            record
                .get(idx)
                .and_then(|v| v.trim().parse::<u32>().ok())
                .ok_or_else(|| {
                    EngineError::MalformedOutput(format!(
                        "TSV row {}: column {idx} is not a number",
                        row + 1
                    ))
                })
        };

        let key = (field(1)?, field(2)?, field(3)?, field(4)?);
        let bounds = Region {
            left: field(6)?,
            top: field(7)?,
            width: field(8)?,
            height: field(9)?,
        };
        let conf = record
            .get(10)
            .and_then(|v| v.trim().parse::<f32>().ok())
            .filter(|c| *c >= 0.0);

        match current.as_mut() {
            Some(line) if line.key == key => {
                line.words.push(text.to_string());
                line.confidences.extend(conf);
                line.bounds = Some(match line.bounds {
                    Some(b) => b.union(&bounds),
                    None => bounds,
                });
            }
            _ => {
                if let Some(done) = current.take() {
                    regions.push(done.finish());
                }
                current = Some(LineAccumulator {
                    key,
                    words: vec![text.to_string()],
                    confidences: conf.into_iter().collect(),
                    bounds: Some(bounds),
                });
            }
        }
    }

    if let Some(done) = current {
        regions.push(done.finish());
    }
    Ok(regions)
}
