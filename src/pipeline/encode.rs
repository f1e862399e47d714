//! Image encoding: rasterised pages and image files → base64 `ImageData`.
//!
//! Rendered pages are PNG-encoded: lossless compression preserves text
//! crispness, and JPEG artefacts on rendered text measurably degrade vision
//! transcription. Image sources are attached in their native format instead
//! of being re-encoded. `detail: "high"` asks GPT-4-class models for the
//! full image tile budget so fine print and small tables survive.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Encode a rasterised page as a base64 PNG ready for the vision API.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded page image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

/// Encode an image file's raw bytes for the vision API, keeping its native
/// format. The mime type is derived from the extension.
pub fn encode_image_file(path: &Path) -> Result<ImageData, std::io::Error> {
    let bytes = std::fs::read(path)?;
    let mime = mime_for_extension(path);
    Ok(ImageData::new(STANDARD.encode(&bytes), mime).with_detail("high"))
}

fn mime_for_extension(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("tiff") => "image/tiff",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let data = encode_page(&img).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert!(!decoded.is_empty());
    }

    #[test]
    fn mime_types_by_extension() {
        assert_eq!(mime_for_extension(Path::new("a.PNG")), "image/png");
        assert_eq!(mime_for_extension(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(mime_for_extension(Path::new("a.webp")), "image/webp");
        assert_eq!(mime_for_extension(Path::new("a")), "application/octet-stream");
    }
}
