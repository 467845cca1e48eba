//! Input normalisation: one file on disk → one or more PNG buffers.
//!
//! Raster inputs yield exactly one buffer. PDFs yield one buffer per page,
//! rendered by [`super::render`]. Decoding and rendering are CPU-bound, so
//! the whole conversion runs on the blocking thread pool.

use super::enumerate::is_pdf;
use super::{encode, render};
use crate::config::AnnotatorConfig;
use crate::error::FileError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Convert `path` into PNG-encoded buffers, one per page.
pub async fn to_png_buffers(
    path: &Path,
    config: &AnnotatorConfig,
) -> Result<Vec<Vec<u8>>, FileError> {
    let path = path.to_path_buf();
    let max_pixels = config.max_rendered_pixels;
    let lib_dir = config.pdfium_lib_path.clone();

    tokio::task::spawn_blocking(move || normalize_blocking(&path, max_pixels, lib_dir))
        .await
        .map_err(|e| FileError::Task(format!("normalize task panicked: {}", e)))?
}

/// Blocking implementation of [`to_png_buffers`].
pub fn normalize_blocking(
    path: &Path,
    max_pixels: u32,
    lib_dir: Option<PathBuf>,
) -> Result<Vec<Vec<u8>>, FileError> {
    let images = if is_pdf(path) {
        render::render_pdf_pages(path, max_pixels, lib_dir.as_deref())?
    } else {
        let img = image::ImageReader::open(path)
            .and_then(|r| r.with_guessed_format())
            .map_err(|e| FileError::ImageDecode {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?
            .decode()
            .map_err(|e| FileError::ImageDecode {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
        vec![img]
    };

    let buffers = images
        .iter()
        .map(|img| {
            encode::encode_png(img).map_err(|e| FileError::ImageEncode {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    debug!("{}: {} PNG buffer(s)", path.display(), buffers.len());
    Ok(buffers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn png_yields_one_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipt.png");
        RgbImage::from_pixel(4, 3, Rgb([10, 20, 30])).save(&path).unwrap();

        let buffers = normalize_blocking(&path, 2000, None).unwrap();
        assert_eq!(buffers.len(), 1);
        let decoded = image::load_from_memory(&buffers[0]).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 3));
    }

    #[test]
    fn content_decides_format_not_extension() {
        let dir = tempfile::tempdir().unwrap();
        let jpeg_path = dir.path().join("photo.jpg");
        RgbImage::from_pixel(2, 2, Rgb([200, 200, 200])).save(&jpeg_path).unwrap();
        let disguised = dir.path().join("photo.png");
        std::fs::rename(&jpeg_path, &disguised).unwrap();

        let buffers = normalize_blocking(&disguised, 2000, None).unwrap();
        assert_eq!(&buffers[0][..4], b"\x89PNG");
    }

    #[test]
    fn garbage_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not an image").unwrap();

        let err = normalize_blocking(&path, 2000, None).unwrap_err();
        assert!(matches!(err, FileError::ImageDecode { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn missing_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = AnnotatorConfig::default();
        let err = to_png_buffers(&dir.path().join("gone.png"), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, FileError::ImageDecode { .. }));
    }

    #[test]
    fn pdf_without_pdfium_is_file_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.pdf");
        std::fs::write(&path, b"%PDF-1.4\n").unwrap();
        let empty_lib_dir = tempfile::tempdir().unwrap();

        let err = normalize_blocking(&path, 2000, Some(empty_lib_dir.path().to_path_buf()))
            .unwrap_err();
        assert!(
            matches!(
                err,
                FileError::PdfiumUnavailable(_) | FileError::PdfRender { .. }
            ),
            "got {err:?}"
        );
    }

    #[test]
    fn uppercase_pdf_extension_takes_pdf_branch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("SCAN.PDF");
        std::fs::write(&path, b"%PDF-1.4\n").unwrap();
        let empty_lib_dir = tempfile::tempdir().unwrap();

        let err = normalize_blocking(&path, 2000, Some(empty_lib_dir.path().to_path_buf()))
            .unwrap_err();
        assert!(!matches!(err, FileError::ImageDecode { .. }), "got {err:?}");
    }
}
