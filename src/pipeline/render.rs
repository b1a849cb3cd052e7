//! PDF rasterisation: render every page to a `DynamicImage` via pdfium.
//!
//! pdfium keeps thread-local state and must not be driven from an async
//! worker thread, so both entry points hop onto the blocking pool with
//! `tokio::task::spawn_blocking`.
//!
//! Pages come back in document order. A PDF with zero pages is an error, not
//! an empty vector: the compiler is expected to produce at least one page and
//! an empty result would hide a broken document from the caller.

use crate::config::RenderConfig;
use crate::error::RenderError;
use crate::pdfium::shared_pdfium;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Rasterise all pages of a PDF, in page order.
pub async fn render_pages(
    pdf_path: &Path,
    config: &RenderConfig,
) -> Result<Vec<DynamicImage>, RenderError> {
    let path = pdf_path.to_path_buf();
    let scale = config.scale_factor();
    let max_pixels = config.max_rendered_pixels;
    let lib_path = config.pdfium_lib_path.clone();

    tokio::task::spawn_blocking(move || {
        render_pages_blocking(&path, scale, max_pixels, lib_path.as_deref())
    })
    .await
    .map_err(|e| RenderError::Internal(format!("Render task panicked: {}", e)))?
}

/// Open a PDF and return its page count without rendering anything.
///
/// Fails with [`RenderError::EmptyDocument`] for a zero-page PDF, so callers
/// that only need the bytes still get the same loud failure as
/// [`render_pages`].
pub async fn page_count(pdf_path: &Path, config: &RenderConfig) -> Result<usize, RenderError> {
    let path = pdf_path.to_path_buf();
    let lib_path = config.pdfium_lib_path.clone();

    tokio::task::spawn_blocking(move || {
        let pdfium = shared_pdfium(lib_path.as_deref())?;
        let document = open_document(pdfium, &path)?;
        non_empty_page_count(&document, &path)
    })
    .await
    .map_err(|e| RenderError::Internal(format!("Page count task panicked: {}", e)))?
}

/// Blocking implementation of page rendering.
fn render_pages_blocking(
    pdf_path: &Path,
    scale: f32,
    max_pixels: u32,
    lib_path: Option<&Path>,
) -> Result<Vec<DynamicImage>, RenderError> {
    let pdfium = shared_pdfium(lib_path)?;
    let document = open_document(pdfium, pdf_path)?;
    let total_pages = non_empty_page_count(&document, pdf_path)?;
    info!("PDF loaded: {} pages", total_pages);

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(scale)
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let pages = document.pages();
    let mut images = Vec::with_capacity(total_pages);

    for idx in 0..total_pages {
        let page = pages
            .get(idx as u16)
            .map_err(|e| RenderError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?;

        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            RenderError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            }
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

fn open_document<'a>(pdfium: &'a Pdfium, pdf_path: &Path) -> Result<PdfDocument<'a>, RenderError> {
    pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| RenderError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: format!("{:?}", e),
        })
}

fn non_empty_page_count(document: &PdfDocument<'_>, pdf_path: &Path) -> Result<usize, RenderError> {
    let total = document.pages().len() as usize;
    if total == 0 {
        return Err(RenderError::EmptyDocument {
            path: PathBuf::from(pdf_path),
        });
    }
    Ok(total)
}
