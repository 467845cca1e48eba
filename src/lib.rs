//! # invoice-annotator
//!
//! Extract invoice and receipt fields from scanned images with a local
//! vision-language model.
//!
//! Each image in a folder is sent to an Ollama-served model (by default
//! `llava:13b-v1.6`) with a fixed prompt asking for six fields as JSON. The
//! answers are collected into a CSV that doubles as a cache: a file that
//! already has a row is never sent to the model again.
//!
//! ## Pipeline Overview
//!
//! ```text
//! ./images/*.png
//!  │
//!  ├─ 1. Cache      load image_descriptions.csv (or start empty)
//!  ├─ 2. Enumerate  sorted *.png, minus files already in the table
//!  ├─ 3. Normalize  decode → PNG bytes (PDFs: one buffer per page, pdfium)
//!  ├─ 4. Inference  stream /api/generate, echo to stdout, concatenate
//!  ├─ 5. Parse      JSON → six fields, "Error" on any failure
//!  └─ 6. Persist    add good rows, rewrite the CSV once at the end
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use invoice_annotator::{annotate, AnnotatorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AnnotatorConfig::default();
//!     let summary = annotate(&config).await?;
//!     eprintln!("{} new rows, {} failed", summary.written, summary.failed);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `invoice-annotator` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod annotate;
pub mod config;
pub mod error;
pub mod inference;
pub mod parse;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod table;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use annotate::{annotate, annotate_sync, Annotator, RunSummary};
pub use config::{AnnotatorConfig, AnnotatorConfigBuilder};
pub use error::{AnnotatorError, FileError};
pub use inference::{OllamaClient, VisionModel};
pub use parse::{parse_response, Extraction};
pub use progress::{AnnotationProgressCallback, NoopProgressCallback, ProgressCallback};
pub use table::{InvoiceRecord, ResultsTable};
