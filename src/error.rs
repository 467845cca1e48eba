//! Error types for the invoice-annotator library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`AnnotatorError`] — **Fatal**: the run cannot proceed or cannot be
//!   persisted (images folder unreadable, results CSV not writable, bad
//!   configuration). Returned as `Err(AnnotatorError)` from
//!   [`crate::annotate::Annotator::run`].
//!
//! * [`FileError`] — **Non-fatal**: a single file failed (undecodable image,
//!   pdfium missing, model unreachable). The runner logs it and moves on; the
//!   file stays out of the results table and is retried on the next run.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the invoice-annotator library.
#[derive(Debug, Error)]
pub enum AnnotatorError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The images folder could not be listed.
    #[error("Failed to list images in '{dir}': {source}")]
    EnumerationFailed {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Results table errors ──────────────────────────────────────────────
    /// The results CSV exists but could not be read or parsed.
    #[error("Failed to read results table '{path}': {detail}")]
    CacheReadFailed { path: PathBuf, detail: String },

    /// The results CSV could not be written.
    #[error("Failed to write results table '{path}': {detail}")]
    CacheWriteFailed { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single input file.
#[derive(Debug, Clone, Error)]
pub enum FileError {
    /// The file could not be opened or decoded as an image.
    #[error("{path}: could not decode image: {detail}")]
    ImageDecode { path: PathBuf, detail: String },

    /// Re-encoding the decoded image as PNG failed.
    #[error("{path}: PNG encoding failed: {detail}")]
    ImageEncode { path: PathBuf, detail: String },

    /// No pdfium library could be bound for PDF rendering.
    #[error(
        "pdfium library unavailable: {0}\n\
Set PDFIUM_LIB_PATH (or --pdfium-lib) to a directory containing libpdfium."
    )]
    PdfiumUnavailable(String),

    /// pdfium could not open or rasterise the document.
    #[error("{path}: PDF rendering failed: {detail}")]
    PdfRender { path: PathBuf, detail: String },

    /// The HTTP request to the model server failed before a response arrived.
    #[error("Inference request to '{url}' failed: {detail}")]
    InferenceRequest { url: String, detail: String },

    /// The model server answered with a non-success status.
    #[error("Inference server returned HTTP {status}: {body}")]
    InferenceStatus { status: u16, body: String },

    /// The response stream broke or carried an undecodable chunk.
    #[error("Inference stream failed: {0}")]
    InferenceStream(String),

    /// The model server reported an error inside the stream.
    #[error("Model '{model}' reported an error: {message}")]
    ModelError { model: String, message: String },

    /// A blocking decode/render task panicked.
    #[error("Worker task failed: {0}")]
    Task(String),
}
