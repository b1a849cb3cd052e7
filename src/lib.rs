//! # tex2slides
//!
//! Compile LaTeX into slide images over HTTP.
//!
//! A client posts LaTeX source; the service runs `pdflatex` on it in a
//! private scratch directory, rasterises every page of the resulting PDF with
//! pdfium and answers with the pages as base64 JPEGs, in page order. A second
//! endpoint hands back either the source itself or the compiled PDF as a
//! file download.
//!
//! ## Pipeline Overview
//!
//! ```text
//! LaTeX source
//!  │
//!  ├─ 1. Source   write input.tex into a fresh scratch dir
//!  ├─ 2. Compile  pdflatex -jobname=output (timeout, exit-status policy)
//!  ├─ 3. Render   rasterise pages via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 4. Encode   RGB → JPEG → base64
//!  └─ 5. Output   {"slides": [...]} + per-request stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tex2slides::{latex_to_slides, RenderConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RenderConfig::default();
//!     let latex = r"\documentclass{beamer}\begin{document}\begin{frame}Hi\end{frame}\end{document}";
//!     let output = latex_to_slides(latex, &config).await?;
//!     println!("{} slides in {}ms", output.slides.len(), output.stats.total_duration_ms);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `tex2slides` binary (clap + anyhow + tracing-subscriber) |
//!
//! ## Runtime requirements
//!
//! A LaTeX engine on `PATH` (or [`RenderConfig::latex_program`]) and a pdfium
//! shared library; see [`pdfium`] for where it is looked up.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod logfile;
pub mod output;
pub mod pdfium;
pub mod pipeline;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExitStatusPolicy, RenderConfig, RenderConfigBuilder, ServerConfig};
pub use convert::{latex_to_pdf, latex_to_slides};
pub use error::RenderError;
pub use logfile::RotatingFile;
pub use output::{PdfOutput, RenderStats, SlidesOutput};
pub use server::{router, serve};
