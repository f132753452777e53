//! Image encoding: `DynamicImage` → PNG bytes → base64 `ImageData`.
//!
//! PNG over JPEG because it is lossless — caption quality depends on the
//! VLM reading small text on the page, and JPEG artefacts on rendered text
//! measurably hurt that. The same PNG bytes serve double duty: written to
//! disk as the record's `image_path`, and base64-wrapped into the caption
//! request body.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// PNG-encode a rendered image.
pub fn png_bytes(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Wrap PNG bytes as a base64 attachment for the multimodal API.
///
/// `detail: "high"` gives GPT-4-class models the full image tile budget;
/// without it small figure labels are lost and captions get vague.
pub fn to_image_data(png: &[u8]) -> ImageData {
    let b64 = STANDARD.encode(png);
    debug!("Encoded image → {} bytes base64", b64.len());
    ImageData::new(b64, "image/png").with_detail("high")
}
