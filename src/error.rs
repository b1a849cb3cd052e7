//! Error types for the tex2slides library.
//!
//! Every pipeline stage returns [`RenderError`]. The variants are grouped by
//! the stage that raises them so a log line alone tells an operator how far a
//! request got: materialising the source, running the compiler, or turning
//! the PDF into images.
//!
//! The HTTP layer ([`crate::server`]) maps these onto status codes but never
//! echoes the details back to the caller; they only reach the log.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the tex2slides pipeline.
#[derive(Debug, Error)]
pub enum RenderError {
    // ── Source materialisation ────────────────────────────────────────────
    /// The scratch directory or the source file could not be written.
    #[error("Failed to materialise LaTeX source at '{path}': {source}")]
    Materialize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Compiler errors ───────────────────────────────────────────────────
    /// The compiler executable does not exist on PATH.
    #[error("LaTeX compiler '{program}' not found.\nInstall a TeX distribution or set --latex-program.")]
    CompilerNotFound { program: String },

    /// The compiler exists but could not be started.
    #[error("Failed to start LaTeX compiler '{program}': {source}")]
    CompilerSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The compiler ran longer than the configured timeout and was killed.
    #[error("LaTeX compilation timed out after {secs}s")]
    CompileTimeout { secs: u64 },

    /// The compiler exited unsuccessfully and the policy rejects the result.
    #[error("LaTeX compilation failed (exit code {code:?})\n{log_tail}")]
    CompilationFailed { code: Option<i32>, log_tail: String },

    /// The compiler reported success but left no PDF behind.
    #[error("Compiler exited successfully but produced no PDF at '{path}'")]
    PdfMissing { path: PathBuf },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or pass --pdfium-lib.\n\
Prebuilt libraries: https://github.com/bblanchon/pdfium-binaries/releases"
    )]
    PdfiumBindingFailed(String),

    /// pdfium could not open the compiled PDF.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// The PDF opened fine but has no pages to rasterise.
    #[error("PDF '{path}' has no pages")]
    EmptyDocument { path: PathBuf },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// A rendered page could not be JPEG-encoded.
    #[error("Encoding failed for page {page}: {detail}")]
    EncodingFailed { page: usize, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RenderError {
    /// True when the failure came from the LaTeX source itself rather than
    /// from the host (missing tools, disk, pdfium).
    pub fn is_compilation_failure(&self) -> bool {
        matches!(
            self,
            RenderError::CompilationFailed { .. }
                | RenderError::PdfMissing { .. }
                | RenderError::EmptyDocument { .. }
        )
    }
}
