//! Image encoding: `DynamicImage` → PNG bytes → base64 for the request body.
//!
//! Every input is re-encoded as PNG, whatever its source format. PNG is
//! lossless, so small print on a receipt survives the round trip.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode an image as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!("Encoded {}x{} image → {} bytes PNG", img.width(), img.height(), buf.len());
    Ok(buf)
}

/// Base64-encode PNG bytes for Ollama's `images` array.
pub fn to_base64(png: &[u8]) -> String {
    STANDARD.encode(png)
}
