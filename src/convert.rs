//! Conversion entry points: LaTeX source in, slides or PDF bytes out.
//!
//! Both functions own their scratch directory for exactly the duration of
//! the call. Anything the caller gets back (images, PDF bytes) has been read
//! into memory before the directory is removed.

use crate::config::RenderConfig;
use crate::error::RenderError;
use crate::output::{PdfOutput, RenderStats, SlidesOutput};
use crate::pipeline::{compile, encode, render, source};
use std::time::Instant;
use tracing::{debug, info};

/// Compile LaTeX source and return every page as a base64 JPEG.
///
/// # Errors
/// Any stage failure aborts the whole conversion; there are no partial
/// results. See [`RenderError`] for the stages.
pub async fn latex_to_slides(
    latex: &str,
    config: &RenderConfig,
) -> Result<SlidesOutput, RenderError> {
    let total_start = Instant::now();
    info!("Generating slides from {} bytes of LaTeX", latex.len());
    debug!("LaTeX source:\n{}", latex);

    // ── Step 1: Materialise source ───────────────────────────────────────
    let workspace = source::materialize(latex, config.scratch_root.as_deref()).await?;

    // ── Step 2: Compile ──────────────────────────────────────────────────
    let pdf = compile::compile(&workspace, config).await?;

    // ── Step 3: Rasterise pages ──────────────────────────────────────────
    let render_start = Instant::now();
    let images = render::render_pages(&pdf.path, config).await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;

    // The scratch dir is no longer needed once the bitmaps are in memory.
    drop(workspace);

    // ── Step 4: Encode ───────────────────────────────────────────────────
    let encode_start = Instant::now();
    let quality = config.jpeg_quality;
    let slides = tokio::task::spawn_blocking(move || encode::encode_pages(&images, quality))
        .await
        .map_err(|e| RenderError::Internal(format!("Encode task panicked: {}", e)))??;
    let encode_duration_ms = encode_start.elapsed().as_millis() as u64;

    let stats = RenderStats {
        page_count: slides.len(),
        compiler_exit_code: pdf.exit_code,
        compile_duration_ms: pdf.duration_ms,
        render_duration_ms,
        encode_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        encoded_bytes: slides.iter().map(String::len).sum(),
    };

    info!(
        "Encoded {} images with base64 encoding ({} bytes, {}ms total)",
        stats.page_count, stats.encoded_bytes, stats.total_duration_ms
    );

    Ok(SlidesOutput { slides, stats })
}

/// Compile LaTeX source and return the PDF bytes.
///
/// The PDF is opened with pdfium before it is returned so a document with
/// zero pages fails here, the same way it fails in [`latex_to_slides`].
pub async fn latex_to_pdf(latex: &str, config: &RenderConfig) -> Result<PdfOutput, RenderError> {
    info!("Compiling PDF from {} bytes of LaTeX", latex.len());
    debug!("LaTeX source:\n{}", latex);

    let workspace = source::materialize(latex, config.scratch_root.as_deref()).await?;
    let pdf = compile::compile(&workspace, config).await?;
    let page_count = render::page_count(&pdf.path, config).await?;

    let bytes = tokio::fs::read(&pdf.path)
        .await
        .map_err(|e| RenderError::Internal(format!("Failed to read compiled PDF: {}", e)))?;

    info!("Compiled PDF: {} pages, {} bytes", page_count, bytes.len());

    Ok(PdfOutput {
        bytes,
        page_count,
        compiler_exit_code: pdf.exit_code,
    })
}
