//! Pixel conversion and PNG encoding for rendered pages.
//!
//! Pdfium hands back RGBA bitmaps; OCR engines work on 8-bit RGB. PNG is the
//! interchange format for both backends because it is lossless: JPEG
//! artefacts around thin drawing text hurt recognition far more than the
//! larger file size does.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::{DynamicImage, RgbImage};
use std::io::Cursor;
use tracing::debug;

/// Flatten a rendered page into an 8-bit RGB pixel matrix.
///
/// Rendering happens on a white background, so dropping alpha is lossless.
pub fn to_pixels(img: DynamicImage) -> RgbImage {
    match img {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => other.to_rgb8(),
    }
}

/// Encode a page as PNG bytes.
pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!(
        width = img.width(),
        height = img.height(),
        bytes = buf.len(),
        "encoded page PNG"
    );
    Ok(buf)
}

/// Encode a page as a base64 PNG attachment for a vision model.
///
/// `detail: "high"` keeps the full tile budget on OpenAI-style APIs; without
/// it small dimension labels are lost.
pub fn encode_image_data(img: &RgbImage) -> Result<ImageData, image::ImageError> {
    let png = encode_png(img)?;
    let b64 = STANDARD.encode(&png);
    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}
