//! Pipeline stages that turn a folder of scans into model-ready images.
//!
//! ## Data Flow
//!
//! ```text
//! enumerate ──▶ normalize ──▶ (render) ──▶ encode ──▶ inference
//! (./images)    (per file)     (pdfium)     (PNG)
//! ```
//!
//! 1. [`enumerate`] — list `*.png` (and optionally `*.pdf`) in the images folder
//! 2. [`normalize`] — decode one file on the blocking pool, one image per page
//! 3. [`render`]    — rasterise PDF pages; only reached for PDFs
//! 4. [`encode`]    — PNG-encode each image and base64-wrap it for the request

pub mod encode;
pub mod enumerate;
pub mod normalize;
pub mod render;
