//! In-memory stand-ins for pdfium and the OCR engine.
//!
//! `FakeRasterizer` renders page `i` as a tiny image whose every pixel is
//! `i`, so `ScriptedEngine` can tell which page it is looking at and answer
//! with the regions scripted for that page.

#![allow(dead_code)]

use drawing_ocr::engine::{OcrEngine, TextRegion};
use drawing_ocr::error::{DrawingOcrError, EngineError};
use drawing_ocr::pipeline::render::{PageSource, Rasterizer};
use drawing_ocr::{PagePipeline, PipelineConfig};
use image::{DynamicImage, Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Smallest byte string that passes the `%PDF-` check.
pub fn pdf_bytes() -> Vec<u8> {
    b"%PDF-1.7\n1 0 obj\n<< /Type /Catalog >>\nendobj\ntrailer\n<<>>\n%%EOF\n".to_vec()
}

pub struct FakeRasterizer {
    pages: usize,
    /// Staged paths seen, with whether the file existed while open.
    pub opened: Mutex<Vec<(PathBuf, bool)>>,
    pub scales: Mutex<Vec<f32>>,
}

impl FakeRasterizer {
    pub fn new(pages: usize) -> Arc<Self> {
        Arc::new(Self {
            pages,
            opened: Mutex::new(Vec::new()),
            scales: Mutex::new(Vec::new()),
        })
    }
}

struct FakePages<'a> {
    count: usize,
    scales: &'a Mutex<Vec<f32>>,
}

impl PageSource for FakePages<'_> {
    fn page_count(&self) -> usize {
        self.count
    }

    fn render(&mut self, index: usize, scale: f32) -> Result<DynamicImage, DrawingOcrError> {
        self.scales.lock().unwrap().push(scale);
        let v = index as u8;
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([v, v, v]))))
    }
}

impl Rasterizer for FakeRasterizer {
    fn with_document(
        &self,
        path: &Path,
        visit: &mut dyn FnMut(&mut dyn PageSource) -> Result<(), DrawingOcrError>,
    ) -> Result<(), DrawingOcrError> {
        self.opened
            .lock()
            .unwrap()
            .push((path.to_path_buf(), path.is_file()));
        let mut pages = FakePages {
            count: self.pages,
            scales: &self.scales,
        };
        visit(&mut pages)
    }
}

/// Answers each page with the regions scripted for it; unscripted pages
/// get no regions. Optionally fails on one 1-based page.
pub struct ScriptedEngine {
    script: Vec<Vec<TextRegion>>,
    fail_on: Option<usize>,
    pub calls: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new(script: Vec<Vec<TextRegion>>) -> Arc<Self> {
        Arc::new(Self {
            script,
            fail_on: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing_on(page_num: usize) -> Arc<Self> {
        Arc::new(Self {
            script: Vec::new(),
            fail_on: Some(page_num),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrEngine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn recognize(&self, image: &RgbImage) -> Result<Vec<TextRegion>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let index = image.get_pixel(0, 0)[0] as usize;
        if self.fail_on == Some(index + 1) {
            return Err(EngineError::Failed("model crashed".into()));
        }
        Ok(self.script.get(index).cloned().unwrap_or_default())
    }
}

/// Regions carrying the given texts; `None` is a region without text.
pub fn regions(texts: &[Option<&str>]) -> Vec<TextRegion> {
    texts
        .iter()
        .map(|t| TextRegion {
            text: t.map(str::to_string),
            ..Default::default()
        })
        .collect()
}

pub fn pipeline(
    config: PipelineConfig,
    rasterizer: Arc<FakeRasterizer>,
    engine: Arc<ScriptedEngine>,
) -> PagePipeline {
    PagePipeline::new(config, rasterizer, engine)
}

/// Ways a rasterizer can fail after the upload passed the header check.
#[derive(Debug, Clone, Copy)]
pub enum Breakage {
    /// pdfium refuses to open the file.
    Unreadable,
    /// Page `n` (1-based) cannot be rendered.
    PageUnrenderable(usize),
}

pub struct BrokenRasterizer {
    pages: usize,
    breakage: Breakage,
}

impl BrokenRasterizer {
    pub fn new(pages: usize, breakage: Breakage) -> Arc<Self> {
        Arc::new(Self { pages, breakage })
    }
}

struct BrokenPages {
    count: usize,
    bad_page: usize,
}

impl PageSource for BrokenPages {
    fn page_count(&self) -> usize {
        self.count
    }

    fn render(&mut self, index: usize, _scale: f32) -> Result<DynamicImage, DrawingOcrError> {
        if index + 1 == self.bad_page {
            return Err(DrawingOcrError::RasterisationFailed {
                page: index + 1,
                detail: "bitmap allocation failed".into(),
            });
        }
        let v = index as u8;
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([v, v, v]))))
    }
}

impl Rasterizer for BrokenRasterizer {
    fn with_document(
        &self,
        _path: &Path,
        visit: &mut dyn FnMut(&mut dyn PageSource) -> Result<(), DrawingOcrError>,
    ) -> Result<(), DrawingOcrError> {
        match self.breakage {
            Breakage::Unreadable => Err(DrawingOcrError::DocumentFormat {
                detail: "pdfium could not open the document: FormatError".into(),
            }),
            Breakage::PageUnrenderable(bad_page) => visit(&mut BrokenPages {
                count: self.pages,
                bad_page,
            }),
        }
    }
}

/// Takes `delay` per page and records how many pages were being read at once.
pub struct SlowEngine {
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    pub calls: AtomicUsize,
}

impl SlowEngine {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrEngine for SlowEngine {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn recognize(&self, _image: &RgbImage) -> Result<Vec<TextRegion>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(vec![TextRegion::with_text("SLOW")])
    }
}
