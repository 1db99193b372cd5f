//! Progress-callback trait for per-page extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the extractor scans each page. The library knows nothing about
//! how the host displays them; the `btb` binary renders a terminal progress
//! bar, tests count calls.
//!
//! # Example
//!
//! ```rust
//! use btb_tables::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct TableCounter {
//!     tables: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for TableCounter {
//!     fn on_page_complete(&self, _page_num: usize, _total_pages: usize, tables_found: usize) {
//!         self.tables.fetch_add(tables_found, Ordering::SeqCst);
//!     }
//! }
//!
//! let counter = Arc::new(TableCounter { tables: AtomicUsize::new(0) });
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the extractor as it scans each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Implementations must be `Send + Sync` so a config
/// can be shared with a worker thread.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once, before the first page is scanned.
    ///
    /// # Arguments
    /// * `total_pages` — number of pages that will be scanned
    fn on_extraction_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called before a page is scanned.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed page number
    /// * `total_pages` — number of pages being scanned
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called after a page has been scanned.
    ///
    /// # Arguments
    /// * `page_num`     — 1-indexed page number
    /// * `total_pages`  — number of pages being scanned
    /// * `tables_found` — tables detected on this page (may be zero)
    fn on_page_complete(&self, page_num: usize, total_pages: usize, tables_found: usize) {
        let _ = (page_num, total_pages, tables_found);
    }

    /// Called once, after every selected page has been scanned.
    ///
    /// # Arguments
    /// * `total_pages` — pages scanned
    /// * `rows_found`  — raw rows across every detected table
    fn on_extraction_complete(&self, total_pages: usize, rows_found: usize) {
        let _ = (total_pages, rows_found);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        starts: AtomicUsize,
        tables: AtomicUsize,
        started_total: AtomicUsize,
        rows_total: AtomicUsize,
    }

    impl ExtractionProgressCallback for TrackingCallback {
        fn on_extraction_start(&self, total_pages: usize) {
            self.started_total.store(total_pages, Ordering::SeqCst);
        }

        fn on_page_start(&self, _page_num: usize, _total_pages: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _page_num: usize, _total_pages: usize, tables_found: usize) {
            self.tables.fetch_add(tables_found, Ordering::SeqCst);
        }

        fn on_extraction_complete(&self, _total_pages: usize, rows_found: usize) {
            self.rows_total.store(rows_found, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_extraction_start(5);
        cb.on_page_start(1, 5);
        cb.on_page_complete(1, 5, 2);
        cb.on_extraction_complete(5, 40);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback {
            starts: AtomicUsize::new(0),
            tables: AtomicUsize::new(0),
            started_total: AtomicUsize::new(0),
            rows_total: AtomicUsize::new(0),
        };

        tracker.on_extraction_start(3);
        for page in 1..=3 {
            tracker.on_page_start(page, 3);
            tracker.on_page_complete(page, 3, page - 1);
        }
        tracker.on_extraction_complete(3, 17);

        assert_eq!(tracker.started_total.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.tables.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.rows_total.load(Ordering::SeqCst), 17);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_extraction_start(10);
        cb.on_page_complete(1, 10, 0);
    }
}
