//! Progress-callback trait for per-file annotation events.
//!
//! Inject an [`Arc<dyn AnnotationProgressCallback>`] via
//! [`crate::config::AnnotatorConfigBuilder::progress_callback`] to receive
//! events as the runner works through the images folder.
//!
//! # Example
//!
//! ```rust
//! use invoice_annotator::{AnnotationProgressCallback, AnnotatorConfig};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     failed: AtomicUsize,
//! }
//!
//! impl AnnotationProgressCallback for CountingCallback {
//!     fn on_file_error(&self, _index: usize, _total: usize, path: &Path, reason: &str) {
//!         self.failed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}: {}", path.display(), reason);
//!     }
//! }
//!
//! let config = AnnotatorConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { failed: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::annotate::RunSummary;
use crate::parse::Extraction;
use std::path::Path;
use std::sync::Arc;

/// Called by the runner as it processes each file.
///
/// Files are processed one at a time, but implementations must still be
/// `Send + Sync` because the config that carries them is shared freely.
/// All methods have default no-op implementations.
pub trait AnnotationProgressCallback: Send + Sync {
    /// Called once after enumeration.
    ///
    /// # Arguments
    /// * `total`  — files that will be sent to the model
    /// * `cached` — files skipped because the results table already has them
    fn on_run_start(&self, total: usize, cached: usize) {
        let _ = (total, cached);
    }

    /// Called before a file is decoded. `index` is 1-based.
    fn on_file_start(&self, index: usize, total: usize, path: &Path) {
        let _ = (index, total, path);
    }

    /// Called when the model answered and the answer parsed.
    fn on_file_complete(&self, index: usize, total: usize, path: &Path, extraction: &Extraction) {
        let _ = (index, total, path, extraction);
    }

    /// Called when a file produced nothing worth saving.
    ///
    /// `reason` is the decode/inference error, or a note that the
    /// response could not be parsed.
    fn on_file_error(&self, index: usize, total: usize, path: &Path, reason: &str) {
        let _ = (index, total, path, reason);
    }

    /// Called once after the results table has been written.
    fn on_run_complete(&self, summary: &RunSummary) {
        let _ = summary;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnnotationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnnotatorConfig`].
pub type ProgressCallback = Arc<dyn AnnotationProgressCallback>;
