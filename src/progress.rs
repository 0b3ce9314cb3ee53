//! Progress-callback trait for per-page pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgress>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through a document. The server forwards them
//! to `tracing`; the `extract` command drives a terminal progress bar.
//!
//! # Example
//!
//! ```rust
//! use drawing_ocr::{PipelineConfig, PipelineProgress};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl PipelineProgress for CountingCallback {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, text_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Page {}/{} done ({} chars)", page_num, total_pages, text_len);
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { completed: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the page pipeline as it processes each page.
///
/// Pages are processed strictly in order on a single thread, but the
/// pipeline itself runs on Tokio's blocking pool, so implementations must be
/// `Send + Sync`. All methods default to no-ops.
pub trait PipelineProgress: Send + Sync {
    /// Called once the page count is known, before page 1 is rendered.
    fn on_document_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before a page is rendered.
    ///
    /// * `page_num`   : 1-indexed page number
    /// * `total_pages`: total pages in the document
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page's text has been assembled.
    ///
    /// * `text_len`: byte length of the Page Text (0 for a blank page)
    fn on_page_complete(&self, page_num: usize, total_pages: usize, text_len: usize) {
        let _ = (page_num, total_pages, text_len);
    }

    /// Called when a page fails. The document is aborted right after.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after the last page succeeded.
    fn on_document_complete(&self, total_pages: usize, blank_pages: usize) {
        let _ = (total_pages, blank_pages);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgress;

impl PipelineProgress for NoopProgress {}

/// Forwards every event to `tracing` at debug/info level.
///
/// This is what the HTTP server installs.
pub struct TracingProgress;

impl PipelineProgress for TracingProgress {
    fn on_document_start(&self, total_pages: usize) {
        tracing::info!(total_pages, "OCR started");
    }

    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        tracing::debug!(page_num, total_pages, "page started");
    }

    fn on_page_complete(&self, page_num: usize, total_pages: usize, text_len: usize) {
        tracing::debug!(page_num, total_pages, text_len, "page complete");
    }

    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        tracing::warn!(page_num, total_pages, error, "page failed");
    }

    fn on_document_complete(&self, total_pages: usize, blank_pages: usize) {
        tracing::info!(total_pages, blank_pages, "OCR complete");
    }
}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgress>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        started_total: AtomicUsize,
        blank_total: AtomicUsize,
    }

    impl PipelineProgress for TrackingCallback {
        fn on_document_start(&self, total_pages: usize) {
            self.started_total.store(total_pages, Ordering::SeqCst);
        }

        fn on_page_start(&self, _page_num: usize, _total_pages: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _page_num: usize, _total_pages: usize, _text_len: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_error(&self, _page_num: usize, _total_pages: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_complete(&self, _total_pages: usize, blank_pages: usize) {
            self.blank_total.store(blank_pages, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_and_tracing_callbacks_do_not_panic() {
        for cb in [&NoopProgress as &dyn PipelineProgress, &TracingProgress] {
            cb.on_document_start(2);
            cb.on_page_start(1, 2);
            cb.on_page_complete(1, 2, 42);
            cb.on_page_error(2, 2, "engine crashed");
            cb.on_document_complete(2, 0);
        }
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_document_start(3);
        assert_eq!(tracker.started_total.load(Ordering::SeqCst), 3);

        tracker.on_page_start(1, 3);
        tracker.on_page_complete(1, 3, 100);
        tracker.on_page_start(2, 3);
        tracker.on_page_complete(2, 3, 0);
        tracker.on_page_start(3, 3);
        tracker.on_page_error(3, 3, "tesseract exited with status 1");

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);

        tracker.on_document_complete(3, 1);
        assert_eq!(tracker.blank_total.load(Ordering::SeqCst), 1);
    }
}
