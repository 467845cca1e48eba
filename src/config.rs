//! Configuration types for an annotation run.
//!
//! Every knob lives in [`AnnotatorConfig`], built via
//! [`AnnotatorConfigBuilder`]. The defaults reproduce the fixed layout the
//! tool has always used: PNGs under `./images`, results in
//! `image_descriptions.csv`, and `llava:13b-v1.6` served by a local Ollama.

use crate::error::AnnotatorError;
use crate::inference::VisionModel;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default folder scanned for input files.
pub const DEFAULT_IMAGES_DIR: &str = "./images";

/// Default results table path.
pub const DEFAULT_CACHE_PATH: &str = "image_descriptions.csv";

/// Default Ollama model identifier.
pub const DEFAULT_MODEL: &str = "llava:13b-v1.6";

/// Default Ollama server address.
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

/// Configuration for an annotation run.
///
/// Built via [`AnnotatorConfig::builder()`] or using
/// [`AnnotatorConfig::default()`].
///
/// # Example
/// ```rust
/// use invoice_annotator::AnnotatorConfig;
///
/// let config = AnnotatorConfig::builder()
///     .images_dir("./scans")
///     .model("llava:7b")
///     .echo_stream(false)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AnnotatorConfig {
    /// Folder listed for candidate files (no recursion). Default: `./images`.
    pub images_dir: PathBuf,

    /// Results CSV, read at start and rewritten at the end.
    /// Default: `image_descriptions.csv`.
    pub cache_path: PathBuf,

    /// Model identifier sent to Ollama. Default: `llava:13b-v1.6`.
    pub model: String,

    /// Base URL of the Ollama server. Default: `http://localhost:11434`.
    pub ollama_host: String,

    /// Also enumerate `*.pdf` files. Default: false.
    ///
    /// Only `*.png` files are listed unless this is set, even though the
    /// normalizer can render PDF pages.
    pub include_pdf: bool,

    /// Echo streamed model output to stdout as it arrives. Default: true.
    pub echo_stream: bool,

    /// Whole-request timeout for one generation call. Default: None (wait forever).
    pub request_timeout_secs: Option<u64>,

    /// Longest edge, in pixels, of a rendered PDF page. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Directory holding the pdfium shared library. Default: None
    /// (working directory, then the system library search path).
    pub pdfium_lib_path: Option<PathBuf>,

    /// Pre-constructed model client. Takes precedence over `model`/`ollama_host`.
    pub vision_model: Option<Arc<dyn VisionModel>>,

    /// Per-file progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            images_dir: PathBuf::from(DEFAULT_IMAGES_DIR),
            cache_path: PathBuf::from(DEFAULT_CACHE_PATH),
            model: DEFAULT_MODEL.to_string(),
            ollama_host: DEFAULT_OLLAMA_HOST.to_string(),
            include_pdf: false,
            echo_stream: true,
            request_timeout_secs: None,
            max_rendered_pixels: 2000,
            pdfium_lib_path: None,
            vision_model: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnnotatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnotatorConfig")
            .field("images_dir", &self.images_dir)
            .field("cache_path", &self.cache_path)
            .field("model", &self.model)
            .field("ollama_host", &self.ollama_host)
            .field("include_pdf", &self.include_pdf)
            .field("echo_stream", &self.echo_stream)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field(
                "vision_model",
                &self.vision_model.as_ref().map(|_| "<dyn VisionModel>"),
            )
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl AnnotatorConfig {
    /// Create a new builder for `AnnotatorConfig`.
    pub fn builder() -> AnnotatorConfigBuilder {
        AnnotatorConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AnnotatorConfig`].
#[derive(Debug)]
pub struct AnnotatorConfigBuilder {
    config: AnnotatorConfig,
}

impl AnnotatorConfigBuilder {
    pub fn images_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.images_dir = dir.into();
        self
    }

    pub fn cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cache_path = path.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn ollama_host(mut self, host: impl Into<String>) -> Self {
        self.config.ollama_host = host.into();
        self
    }

    pub fn include_pdf(mut self, v: bool) -> Self {
        self.config.include_pdf = v;
        self
    }

    pub fn echo_stream(mut self, v: bool) -> Self {
        self.config.echo_stream = v;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn vision_model(mut self, model: Arc<dyn VisionModel>) -> Self {
        self.config.vision_model = Some(model);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnnotatorConfig, AnnotatorError> {
        let c = &self.config;
        if c.vision_model.is_none() {
            if c.model.trim().is_empty() {
                return Err(AnnotatorError::InvalidConfig(
                    "Model identifier must not be empty".into(),
                ));
            }
            if !(c.ollama_host.starts_with("http://") || c.ollama_host.starts_with("https://")) {
                return Err(AnnotatorError::InvalidConfig(format!(
                    "Ollama host must be an http:// or https:// URL, got '{}'",
                    c.ollama_host
                )));
            }
        }
        if c.max_rendered_pixels < 100 {
            return Err(AnnotatorError::InvalidConfig(format!(
                "Rendered page size must be at least 100 px, got {}",
                c.max_rendered_pixels
            )));
        }
        if c.request_timeout_secs == Some(0) {
            return Err(AnnotatorError::InvalidConfig(
                "Request timeout must be at least 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_fixed_layout() {
        let c = AnnotatorConfig::default();
        assert_eq!(c.images_dir, PathBuf::from("./images"));
        assert_eq!(c.cache_path, PathBuf::from("image_descriptions.csv"));
        assert_eq!(c.model, "llava:13b-v1.6");
        assert!(!c.include_pdf);
        assert!(c.echo_stream);
        assert!(c.request_timeout_secs.is_none());
    }

    #[test]
    fn builder_rejects_bad_host() {
        let err = AnnotatorConfig::builder()
            .ollama_host("localhost:11434")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("http://"), "got: {err}");
    }

    #[test]
    fn builder_rejects_empty_model() {
        assert!(AnnotatorConfig::builder().model("  ").build().is_err());
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        assert!(AnnotatorConfig::builder()
            .request_timeout_secs(0)
            .build()
            .is_err());
    }

    #[test]
    fn debug_hides_trait_objects() {
        let dbg = format!("{:?}", AnnotatorConfig::default());
        assert!(dbg.contains("llava:13b-v1.6"));
        assert!(dbg.contains("vision_model: None"));
    }
}
