//! The annotation run: enumerate, skip cached, extract, persist.
//!
//! Files are handled strictly one after another. Each file goes through
//! normalisation, one model call per page, and parsing; the texts of all
//! pages of one file are concatenated before parsing, so a multi-page PDF is
//! parsed as a single response.
//!
//! Nothing a single file does can abort the run. The only fatal errors are
//! failing to list the images folder and failing to write the results table.

use crate::config::AnnotatorConfig;
use crate::error::{AnnotatorError, FileError};
use crate::inference::{OllamaClient, VisionModel};
use crate::parse::{parse_response, Extraction};
use crate::pipeline::{enumerate, normalize};
use crate::prompts::extraction_prompt;
use crate::table::ResultsTable;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Counts for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Files found in the images folder.
    pub candidates: usize,
    /// Files skipped because the results table already had them.
    pub cached: usize,
    /// Files sent through the pipeline.
    pub processed: usize,
    /// New rows written to the results table.
    pub written: usize,
    /// Processed files that produced no row; they are retried next run.
    pub failed: usize,
    /// Rows in the results table after the run.
    pub table_rows: usize,
    pub duration_ms: u64,
}

/// Runs the pipeline over the images folder.
pub struct Annotator {
    config: AnnotatorConfig,
    model: Arc<dyn VisionModel>,
    prompt: String,
}

impl Annotator {
    /// Resolve the model client and prepare a run.
    ///
    /// A pre-constructed [`AnnotatorConfig::vision_model`] wins; otherwise an
    /// [`OllamaClient`] is built from the config.
    pub fn new(config: AnnotatorConfig) -> Result<Self, AnnotatorError> {
        let model: Arc<dyn VisionModel> = match config.vision_model.clone() {
            Some(model) => model,
            None => Arc::new(OllamaClient::from_config(&config)?),
        };
        Ok(Self {
            config,
            model,
            prompt: extraction_prompt(),
        })
    }

    pub fn config(&self) -> &AnnotatorConfig {
        &self.config
    }

    /// Run one file through normalisation, the model, and the parser.
    ///
    /// Decode and inference failures are logged and reported as `None`.
    /// An unparseable response is `Some(Extraction::error())`.
    pub async fn process_file(&self, path: &Path) -> Option<Extraction> {
        self.process_file_logged(path).await.ok()
    }

    async fn process_file_logged(&self, path: &Path) -> Result<Extraction, FileError> {
        let outcome = self.try_process_file(path).await;
        if let Err(e) = &outcome {
            error!("Error processing image {}: {}", path.display(), e);
        }
        outcome
    }

    async fn try_process_file(&self, path: &Path) -> Result<Extraction, FileError> {
        let buffers = normalize::to_png_buffers(path, &self.config).await?;

        let mut full_response = String::new();
        for (page, png) in buffers.iter().enumerate() {
            debug!(
                "{}: page {} → {} ({} bytes)",
                path.display(),
                page + 1,
                self.model.name(),
                png.len()
            );
            let text = self.model.generate(&self.prompt, png).await?;
            full_response.push_str(&text);
        }

        Ok(parse_response(&full_response))
    }

    /// Process every uncached file and write the results table.
    ///
    /// The table is written even when no row was added.
    pub async fn run(&self) -> Result<RunSummary, AnnotatorError> {
        let start = Instant::now();
        let mut table = ResultsTable::load_or_create(&self.config.cache_path);

        let files = enumerate::list_candidates(&self.config.images_dir, self.config.include_pdf)?;
        let pending: Vec<_> = files
            .iter()
            .filter(|p| !table.contains(&p.to_string_lossy()))
            .collect();

        let mut summary = RunSummary {
            candidates: files.len(),
            cached: files.len() - pending.len(),
            ..RunSummary::default()
        };
        info!(
            "{} files in {}, {} already in {}",
            summary.candidates,
            self.config.images_dir.display(),
            summary.cached,
            self.config.cache_path.display()
        );

        let callback = self.config.progress_callback.as_ref();
        if let Some(cb) = callback {
            cb.on_run_start(pending.len(), summary.cached);
        }

        let total = pending.len();
        for (i, path) in pending.into_iter().enumerate() {
            let index = i + 1;
            let key = path.to_string_lossy().into_owned();
            if self.config.echo_stream {
                println!("\nProcessing {}\n", key);
            }
            if let Some(cb) = callback {
                cb.on_file_start(index, total, path);
            }

            summary.processed += 1;
            let outcome = self.process_file_logged(path).await;
            log_extracted(outcome.as_ref().ok());

            match outcome {
                Ok(extraction) => {
                    if extraction.is_persistable() {
                        if let Some(cb) = callback {
                            cb.on_file_complete(index, total, path, &extraction);
                        }
                        table.upsert(key, extraction.into());
                        summary.written += 1;
                    } else {
                        summary.failed += 1;
                        if let Some(cb) = callback {
                            cb.on_file_error(index, total, path, "model response could not be parsed");
                        }
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    if let Some(cb) = callback {
                        cb.on_file_error(index, total, path, &e.to_string());
                    }
                }
            }
        }

        table.save(&self.config.cache_path).await?;
        summary.table_rows = table.len();
        summary.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Run complete: {} written, {} failed, {} cached, {} rows in {} ({}ms)",
            summary.written,
            summary.failed,
            summary.cached,
            summary.table_rows,
            self.config.cache_path.display(),
            summary.duration_ms
        );
        if let Some(cb) = callback {
            cb.on_run_complete(&summary);
        }

        Ok(summary)
    }
}

/// Log the outcome of one file; a failed file logs `none` for every field.
fn log_extracted(extraction: Option<&Extraction>) {
    let field = |f: fn(&Extraction) -> &str| extraction.map_or("none", f);
    info!(
        "Extracted Data - Total amount: {}, Currency: {}, Description: {}, Invoice date: {}, Is invoice/receipt: {}, Confidence: {}",
        field(|e| e.total_amount.as_str()),
        field(|e| e.currency.as_str()),
        field(|e| e.description.as_str()),
        field(|e| e.invoice_date.as_str()),
        field(|e| e.is_invoice_receipt.as_str()),
        field(|e| e.confidence.as_str())
    );
}

/// Run the annotation pipeline with `config`.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Returns `Err(AnnotatorError)` only for fatal errors:
/// - the images folder cannot be listed
/// - the results table cannot be written
/// - the HTTP client cannot be built
pub async fn annotate(config: &AnnotatorConfig) -> Result<RunSummary, AnnotatorError> {
    Annotator::new(config.clone())?.run().await
}

/// Synchronous wrapper around [`annotate`].
///
/// Creates a temporary tokio runtime internally.
pub fn annotate_sync(config: &AnnotatorConfig) -> Result<RunSummary, AnnotatorError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| AnnotatorError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(annotate(config))
}
