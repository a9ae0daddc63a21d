//! Progress-callback trait for per-page parse events.
//!
//! Inject an [`Arc<dyn ParseProgressCallback>`] via
//! [`crate::config::ParseConfigBuilder::progress_callback`] to receive events
//! as pages are extracted and reconstructed.
//!
//! # Example
//!
//! ```rust
//! use pdf2quiz::{ParseConfig, ParseProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct LineCounter {
//!     lines: AtomicUsize,
//! }
//!
//! impl ParseProgressCallback for LineCounter {
//!     fn on_page_complete(&self, _page_num: usize, _total_pages: usize, line_count: usize) {
//!         self.lines.fetch_add(line_count, Ordering::SeqCst);
//!     }
//! }
//!
//! let counter = Arc::new(LineCounter { lines: AtomicUsize::new(0) });
//!
//! let config = ParseConfig::builder()
//!     .progress_callback(counter as Arc<dyn ParseProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the parse pipeline as it works through the question document.
///
/// Implementations must be `Send + Sync`: pages are extracted on the blocking
/// thread pool, so `on_page_start` and `on_page_complete` may be called
/// concurrently and out of page order. All methods default to no-ops.
pub trait ParseProgressCallback: Send + Sync {
    /// Called once, after the question document is loaded.
    ///
    /// # Arguments
    /// * `total_pages` — number of pages that will be parsed
    fn on_parse_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called before a page's glyphs are extracted.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed page number
    /// * `total_pages` — pages selected for parsing
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page has been extracted and its lines reconstructed.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed page number
    /// * `total_pages` — pages selected for parsing
    /// * `line_count`  — reconstructed lines on the page
    fn on_page_complete(&self, page_num: usize, total_pages: usize, line_count: usize) {
        let _ = (page_num, total_pages, line_count);
    }

    /// Called once after questions are built.
    ///
    /// # Arguments
    /// * `question_count`   — questions emitted
    /// * `diagnostic_count` — diagnostics raised
    fn on_parse_complete(&self, question_count: usize, diagnostic_count: usize) {
        let _ = (question_count, diagnostic_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ParseProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ParseConfig`].
pub type ProgressCallback = Arc<dyn ParseProgressCallback>;
