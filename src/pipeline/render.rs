//! Chunk rasterisation: render every page of a chunk PDF to images.
//!
//! The vision backend sends a chunk's pages as image attachments on a single
//! request, so this module renders all of them in one `spawn_blocking` hop
//! (pdfium uses thread-local state and must stay off the Tokio workers).
//! The `max_pixels` cap bounds the longest edge regardless of physical page
//! size, keeping memory bounded and matching the resolution sweet spot of
//! current vision models.

use crate::error::DocPipeError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::debug;

/// Rasterise every page of the chunk PDF at `path`, in page order.
pub async fn render_chunk_pages(
    path: &Path,
    max_pixels: u32,
) -> Result<Vec<DynamicImage>, DocPipeError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || render_blocking(&path, max_pixels))
        .await
        .map_err(|e| DocPipeError::Internal(format!("render task panicked: {e}")))?
}

fn render_blocking(path: &Path, max_pixels: u32) -> Result<Vec<DynamicImage>, DocPipeError> {
    let pdfium = Pdfium::default();
    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| DocPipeError::RenderFailed {
            page: 0,
            detail: format!("failed to open chunk: {e:?}"),
        })?;

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let pages = document.pages();
    let mut images = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| DocPipeError::RenderFailed {
                page: idx + 1,
                detail: format!("{e:?}"),
            })?;
        let img = bitmap.as_image();
        debug!("Rendered chunk page {} → {}x{} px", idx + 1, img.width(), img.height());
        images.push(img);
    }

    Ok(images)
}
