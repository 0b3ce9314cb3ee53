//! Page pipeline behaviour against in-memory fakes.

mod common;

use common::{
    pdf_bytes, pipeline, regions, BrokenRasterizer, Breakage, FakeRasterizer, ScriptedEngine,
};
use drawing_ocr::PagePipeline;
use drawing_ocr::error::DrawingOcrError;
use drawing_ocr::output::PAGE_BREAK;
use drawing_ocr::{PipelineConfig, PipelineProgress};
use std::sync::{Arc, Mutex};

fn config_in(dir: &tempfile::TempDir) -> PipelineConfig {
    PipelineConfig::builder()
        .temp_dir(dir.path())
        .build()
        .unwrap()
}

fn staged_files(dir: &tempfile::TempDir) -> usize {
    std::fs::read_dir(dir.path()).unwrap().count()
}

#[test]
fn one_text_per_page_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::new(vec![
        regions(&[Some("TITLE BLOCK"), Some("SHEET 1 OF 3")]),
        regions(&[Some("STRING 1: 12 MODULES")]),
        regions(&[Some("INVERTER 5 kW")]),
    ]);
    let p = pipeline(config_in(&dir), FakeRasterizer::new(3), engine.clone());

    let doc = p.process(&pdf_bytes()).unwrap();

    assert_eq!(doc.page_count(), 3);
    assert_eq!(doc.pages[0], "TITLE BLOCK\nSHEET 1 OF 3\n");
    assert_eq!(doc.pages[1], "STRING 1: 12 MODULES\n");
    assert_eq!(doc.pages[2], "INVERTER 5 kW\n");
    assert_eq!(engine.calls(), 3);
}

#[test]
fn empty_and_textless_regions_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::new(vec![regions(&[Some("A"), Some(""), None, Some("B")])]);
    let p = pipeline(config_in(&dir), FakeRasterizer::new(1), engine);

    let doc = p.process(&pdf_bytes()).unwrap();
    assert_eq!(doc.pages, vec!["A\nB\n".to_string()]);
}

#[test]
fn page_without_regions_is_blank_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::new(vec![regions(&[Some("X")]), Vec::new()]);
    let p = pipeline(config_in(&dir), FakeRasterizer::new(2), engine);

    let doc = p.process(&pdf_bytes()).unwrap();
    assert_eq!(doc.pages[1], "");
    assert!(doc.is_blank(2));
    assert_eq!(doc.stats.blank_pages, 1);
    assert_eq!(doc.stats.regions_detected, 1);
}

#[test]
fn pages_render_at_300_dpi_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let rasterizer = FakeRasterizer::new(2);
    let p = pipeline(config_in(&dir), rasterizer.clone(), ScriptedEngine::new(Vec::new()));

    p.process(&pdf_bytes()).unwrap();

    let scales = rasterizer.scales.lock().unwrap();
    assert_eq!(scales.len(), 2);
    for s in scales.iter() {
        assert!((s - 300.0 / 72.0).abs() < 1e-6);
    }
}

#[test]
fn non_pdf_is_rejected_before_rendering() {
    let dir = tempfile::tempdir().unwrap();
    let rasterizer = FakeRasterizer::new(1);
    let engine = ScriptedEngine::new(Vec::new());
    let p = pipeline(config_in(&dir), rasterizer.clone(), engine.clone());

    let err = p.process(b"\x89PNG\r\n\x1a\n not a pdf").unwrap_err();

    assert!(matches!(err, DrawingOcrError::DocumentFormat { .. }));
    assert!(err.is_rejection());
    assert!(rasterizer.opened.lock().unwrap().is_empty());
    assert_eq!(engine.calls(), 0);
    assert_eq!(staged_files(&dir), 0);
}

#[test]
fn empty_upload_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(config_in(&dir), FakeRasterizer::new(1), ScriptedEngine::new(Vec::new()));
    let err = p.process(b"").unwrap_err();
    assert!(matches!(err, DrawingOcrError::DocumentFormat { .. }));
}

#[test]
fn engine_failure_aborts_the_document() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::failing_on(2);
    let p = pipeline(config_in(&dir), FakeRasterizer::new(4), engine.clone());

    let err = p.process(&pdf_bytes()).unwrap_err();

    match err {
        DrawingOcrError::OcrEngine { page, .. } => assert_eq!(page, 2),
        other => panic!("expected OcrEngine error, got {other:?}"),
    }
    assert_eq!(engine.calls(), 2, "pages after the failure must not be read");
    assert_eq!(staged_files(&dir), 0);
}

#[test]
fn unreadable_pdf_is_a_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::new(Vec::new());
    let p = PagePipeline::new(
        config_in(&dir),
        BrokenRasterizer::new(2, Breakage::Unreadable),
        engine.clone(),
    );

    let err = p.process(&pdf_bytes()).unwrap_err();

    assert!(matches!(err, DrawingOcrError::DocumentFormat { .. }));
    assert!(err.is_rejection());
    assert_eq!(engine.calls(), 0);
    assert_eq!(staged_files(&dir), 0);
}

#[test]
fn render_failure_aborts_before_ocr_of_that_page() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::new(vec![regions(&[Some("OK")])]);
    let p = PagePipeline::new(
        config_in(&dir),
        BrokenRasterizer::new(3, Breakage::PageUnrenderable(2)),
        engine.clone(),
    );

    let err = p.process(&pdf_bytes()).unwrap_err();

    match err {
        DrawingOcrError::RasterisationFailed { page, .. } => assert_eq!(page, 2),
        other => panic!("expected RasterisationFailed, got {other:?}"),
    }
    assert_eq!(engine.calls(), 1, "only page 1 reaches the engine");
    assert_eq!(staged_files(&dir), 0);
}

#[test]
fn unrenderable_first_page_never_reaches_the_engine() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::new(Vec::new());
    let p = PagePipeline::new(
        config_in(&dir),
        BrokenRasterizer::new(1, Breakage::PageUnrenderable(1)),
        engine.clone(),
    );

    assert!(p.process(&pdf_bytes()).is_err());
    assert_eq!(engine.calls(), 0);
    assert_eq!(staged_files(&dir), 0);
}

#[test]
fn zero_page_document_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(config_in(&dir), FakeRasterizer::new(0), ScriptedEngine::new(Vec::new()));
    let err = p.process(&pdf_bytes()).unwrap_err();
    assert!(matches!(err, DrawingOcrError::EmptyDocument));
    assert_eq!(err.code(), "EMPTY_DOCUMENT");
}

#[test]
fn page_limit_is_enforced_before_ocr() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::builder()
        .temp_dir(dir.path())
        .max_pages(2)
        .build()
        .unwrap();
    let engine = ScriptedEngine::new(Vec::new());
    let p = pipeline(config, FakeRasterizer::new(3), engine.clone());

    let err = p.process(&pdf_bytes()).unwrap_err();
    assert!(matches!(err, DrawingOcrError::TooManyPages { pages: 3, max: 2 }));
    assert_eq!(engine.calls(), 0);
}

#[test]
fn staged_upload_exists_during_render_and_is_removed_after() {
    let dir = tempfile::tempdir().unwrap();
    let rasterizer = FakeRasterizer::new(1);
    let p = pipeline(config_in(&dir), rasterizer.clone(), ScriptedEngine::new(Vec::new()));

    p.process(&pdf_bytes()).unwrap();

    let opened = rasterizer.opened.lock().unwrap();
    assert_eq!(opened.len(), 1);
    let (path, existed) = &opened[0];
    assert!(existed);
    assert!(path.starts_with(dir.path()));
    assert!(!path.exists());
    assert_eq!(staged_files(&dir), 0);
}

#[test]
fn processing_is_repeatable() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::new(vec![
        regions(&[Some("N"), Some("E")]),
        regions(&[Some("W")]),
    ]);
    let p = pipeline(config_in(&dir), FakeRasterizer::new(2), engine);

    let first = p.process(&pdf_bytes()).unwrap();
    let second = p.process(&pdf_bytes()).unwrap();
    assert_eq!(first.pages, second.pages);
    assert_eq!(first.export(), second.export());
}

#[test]
fn export_splits_back_into_pages() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::new(vec![
        regions(&[Some("PV ARRAY")]),
        Vec::new(),
        regions(&[Some("DC ISOLATOR"), Some("AC ISOLATOR")]),
    ]);
    let p = pipeline(config_in(&dir), FakeRasterizer::new(3), engine);
    let doc = p.process(&pdf_bytes()).unwrap();

    let export = doc.export();
    assert!(export.starts_with("PAGE 1:\nPV ARRAY\n"));

    let parts: Vec<&str> = export.split(PAGE_BREAK).collect();
    assert_eq!(parts.len(), 3);
    for (i, part) in parts.iter().enumerate() {
        let header = format!("PAGE {}:\n", i + 1);
        assert_eq!(part.strip_prefix(&header), Some(doc.pages[i].as_str()));
    }
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl PipelineProgress for Recorder {
    fn on_document_start(&self, total_pages: usize) {
        self.events.lock().unwrap().push(format!("start {total_pages}"));
    }
    fn on_page_start(&self, page_num: usize, _total: usize) {
        self.events.lock().unwrap().push(format!("page {page_num}"));
    }
    fn on_page_complete(&self, page_num: usize, _total: usize, text_len: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {page_num} {text_len}"));
    }
    fn on_page_error(&self, page_num: usize, _total: usize, _error: &str) {
        self.events.lock().unwrap().push(format!("error {page_num}"));
    }
    fn on_document_complete(&self, total_pages: usize, blank_pages: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("complete {total_pages} {blank_pages}"));
    }
}

#[test]
fn progress_events_follow_page_order() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Arc::new(Recorder::default());
    let config = PipelineConfig::builder()
        .temp_dir(dir.path())
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let engine = ScriptedEngine::new(vec![regions(&[Some("AB")]), Vec::new()]);
    let p = pipeline(config, FakeRasterizer::new(2), engine);

    p.process(&pdf_bytes()).unwrap();

    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec!["start 2", "page 1", "done 1 3", "page 2", "done 2 0", "complete 2 1"]
    );
}

#[test]
fn progress_reports_the_failing_page() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Arc::new(Recorder::default());
    let config = PipelineConfig::builder()
        .temp_dir(dir.path())
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let p = pipeline(config, FakeRasterizer::new(3), ScriptedEngine::failing_on(1));

    assert!(p.process(&pdf_bytes()).is_err());
    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec!["start 3", "page 1", "error 1"]
    );
}

#[tokio::test]
async fn async_processing_matches_blocking() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::new(vec![regions(&[Some("EARTHING")])]);
    let p = Arc::new(pipeline(config_in(&dir), FakeRasterizer::new(1), engine));

    let blocking = p.process(&pdf_bytes()).unwrap();
    let async_doc = p.process_async(pdf_bytes()).await.unwrap();
    assert_eq!(blocking.pages, async_doc.pages);
}
