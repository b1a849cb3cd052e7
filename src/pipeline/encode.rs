//! Image encoding: `DynamicImage` → JPEG bytes → base64 text.
//!
//! Slides travel inside a JSON body, so every page is JPEG-compressed and
//! then base64-encoded with the standard padded alphabet; browsers can drop
//! the result straight into a `data:image/jpeg;base64,` URI.

use crate::error::RenderError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use tracing::debug;

/// JPEG-encode a rendered page.
///
/// pdfium hands back RGBA bitmaps and JPEG has no alpha channel, so the
/// image is flattened to RGB first.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    rgb.write_with_encoder(encoder)?;
    Ok(buf)
}

/// Encode a rendered page as base64 JPEG text.
pub fn encode_page(img: &DynamicImage, quality: u8) -> Result<String, image::ImageError> {
    let jpeg = encode_jpeg(img, quality)?;
    let b64 = STANDARD.encode(&jpeg);
    debug!("Encoded image → {} bytes base64", b64.len());
    Ok(b64)
}

/// Encode every page, keeping page order. Fails on the first bad page.
pub fn encode_pages(images: &[DynamicImage], quality: u8) -> Result<Vec<String>, RenderError> {
    images
        .iter()
        .enumerate()
        .map(|(idx, img)| {
            encode_page(img, quality).map_err(|e| RenderError::EncodingFailed {
                page: idx + 1,
                detail: e.to_string(),
            })
        })
        .collect()
}
