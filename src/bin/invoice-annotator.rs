//! CLI binary for invoice-annotator.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `AnnotatorConfig` and reports progress. Run with no flags it processes
//! `./images/*.png` into `image_descriptions.csv` using `llava:13b-v1.6`.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use invoice_annotator::{
    annotate, AnnotationProgressCallback, AnnotatorConfig, Extraction, ProgressCallback,
    RunSummary,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: a live bar when the model stream is not echoed, plain
/// status lines on stderr when it is (a bar would be torn apart by the
/// streamed text on stdout).
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new(with_bar: bool) -> Arc<Self> {
        let bar = if with_bar {
            let bar = ProgressBar::new(0);
            let style = ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} files  \
                 ⏱ {elapsed_precise}  ETA {eta_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
            bar.set_style(style);
            bar.set_prefix("Annotating");
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        } else {
            ProgressBar::hidden()
        };
        Arc::new(Self { bar })
    }

    fn line(&self, msg: String) {
        if self.bar.is_hidden() {
            eprintln!("{msg}");
        } else {
            self.bar.println(msg);
        }
    }
}

impl AnnotationProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total: usize, cached: usize) {
        self.bar.set_length(total as u64);
        self.line(format!(
            "{} {}  {}",
            cyan("◆"),
            bold(&format!("{total} new files to annotate")),
            dim(&format!("({cached} already in table)"))
        ));
    }

    fn on_file_start(&self, _index: usize, _total: usize, path: &Path) {
        self.bar.set_message(path.display().to_string());
    }

    fn on_file_complete(&self, index: usize, total: usize, path: &Path, extraction: &Extraction) {
        self.line(format!(
            "  {} {:>3}/{:<3} {}  {}",
            green("✓"),
            index,
            total,
            path.display(),
            dim(&format!(
                "{} {} · {}",
                extraction.total_amount, extraction.currency, extraction.description
            )),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, index: usize, total: usize, path: &Path, reason: &str) {
        // Truncate very long error messages to keep output tidy.
        let msg = if reason.chars().count() > 80 {
            format!("{}\u{2026}", reason.chars().take(79).collect::<String>())
        } else {
            reason.to_string()
        };
        self.line(format!(
            "  {} {:>3}/{:<3} {}  {}",
            red("✗"),
            index,
            total,
            path.display(),
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, _summary: &RunSummary) {
        self.bar.finish_and_clear();
    }
}

/// Extract invoice fields from scanned images with a local vision model.
#[derive(Parser, Debug)]
#[command(
    name = "invoice-annotator",
    version,
    about = "Extract invoice/receipt fields from images with a local Ollama vision model",
    long_about = "Sends every *.png in the images folder to a vision model served by Ollama, \
parses the JSON answer into six fields, and keeps the results in a CSV. Files already \
present in the CSV are skipped, so reruns only process new or previously failed files.",
    color = clap::ColorChoice::Auto
)]
struct Cli {
    /// Folder scanned for input files.
    #[arg(long, env = "ANNOTATOR_IMAGES_DIR", default_value = invoice_annotator::config::DEFAULT_IMAGES_DIR)]
    images_dir: PathBuf,

    /// Results CSV (read at start, rewritten at the end).
    #[arg(short, long, env = "ANNOTATOR_OUTPUT", default_value = invoice_annotator::config::DEFAULT_CACHE_PATH)]
    output: PathBuf,

    /// Ollama model identifier.
    #[arg(long, env = "ANNOTATOR_MODEL", default_value = invoice_annotator::config::DEFAULT_MODEL)]
    model: String,

    /// Ollama server URL.
    #[arg(long, env = "OLLAMA_HOST", default_value = invoice_annotator::config::DEFAULT_OLLAMA_HOST)]
    host: String,

    /// Also process *.pdf files (rendered page by page via pdfium).
    #[arg(long)]
    include_pdf: bool,

    /// Do not echo the model's streamed answer to stdout.
    #[arg(long)]
    no_echo: bool,

    /// Per-request timeout in seconds (default: wait indefinitely).
    #[arg(long)]
    timeout: Option<u64>,

    /// Longest edge in pixels of a rendered PDF page.
    #[arg(long, default_value_t = 2000)]
    max_pixels: u32,

    /// Directory containing the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Print the run summary as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ANNOTATOR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "ANNOTATOR_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Echoed model output owns stdout; the bar is only drawn without it, and
    // INFO logs are suppressed while the bar is up.
    let echo = !cli.no_echo && !cli.quiet && !cli.json;
    let show_bar = !cli.quiet && !echo && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_bar {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if cli.quiet {
        None
    } else {
        Some(CliProgressCallback::new(show_bar) as Arc<dyn AnnotationProgressCallback>)
    };

    let config = build_config(&cli, echo, progress_cb)?;

    // ── Run ──────────────────────────────────────────────────────────────
    let summary = annotate(&config).await.context("Annotation run failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if !cli.quiet {
        eprintln!(
            "{}  {} written  {} failed  {} cached  {}ms  →  {} ({} rows)",
            if summary.failed == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            summary.written,
            summary.failed,
            summary.cached,
            summary.duration_ms,
            bold(&cli.output.display().to_string()),
            summary.table_rows,
        );
    }

    Ok(())
}

/// Map CLI args to `AnnotatorConfig`.
fn build_config(
    cli: &Cli,
    echo: bool,
    progress: Option<ProgressCallback>,
) -> Result<AnnotatorConfig> {
    let mut builder = AnnotatorConfig::builder()
        .images_dir(&cli.images_dir)
        .cache_path(&cli.output)
        .model(&cli.model)
        .ollama_host(&cli.host)
        .include_pdf(cli.include_pdf)
        .echo_stream(echo)
        .max_rendered_pixels(cli.max_pixels);

    if let Some(secs) = cli.timeout {
        builder = builder.request_timeout_secs(secs);
    }
    if let Some(ref dir) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(dir);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
