//! PDF rasterisation: render every page of a PDF to a `DynamicImage` via pdfium.
//!
//! pdfium is bound at runtime. The library is looked up in the configured
//! directory first, then the working directory, then the system search path.
//! A missing library only fails the PDF being processed; PNG inputs never
//! touch pdfium.
//!
//! Everything here is blocking and must run inside `spawn_blocking`.

use crate::error::FileError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Bind to a pdfium library.
pub fn bind_pdfium(lib_dir: Option<&Path>) -> Result<Pdfium, FileError> {
    let mut attempts = Vec::new();

    let mut candidates = Vec::new();
    if let Some(dir) = lib_dir {
        candidates.push(Pdfium::pdfium_platform_library_name_at_path(dir));
    }
    candidates.push(Pdfium::pdfium_platform_library_name_at_path("./"));

    for candidate in candidates {
        match Pdfium::bind_to_library(&candidate) {
            Ok(bindings) => {
                debug!("Bound pdfium at {}", candidate.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => attempts.push(format!("{}: {:?}", candidate.display(), e)),
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => Ok(Pdfium::new(bindings)),
        Err(e) => {
            attempts.push(format!("system library: {:?}", e));
            Err(FileError::PdfiumUnavailable(attempts.join("; ")))
        }
    }
}

/// Rasterise all pages of the PDF at `pdf_path`, in page order.
///
/// Each page is scaled so its width is `max_pixels` and its height at most
/// `max_pixels`.
pub fn render_pdf_pages(
    pdf_path: &Path,
    max_pixels: u32,
    lib_dir: Option<&Path>,
) -> Result<Vec<DynamicImage>, FileError> {
    let pdfium = bind_pdfium(lib_dir)?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| FileError::PdfRender {
            path: pdf_path.to_path_buf(),
            detail: format!("{:?}", e),
        })?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut images = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| FileError::PdfRender {
                path: pdf_path.to_path_buf(),
                detail: format!("page {}: {:?}", idx + 1, e),
            })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        images.push(image);
    }

    Ok(images)
}
