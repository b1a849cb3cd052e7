//! Pipeline stages for LaTeX-to-slides conversion.
//!
//! Each submodule implements exactly one step, and the steps only talk to
//! each other through the scratch directory and the values they return.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ compile ──▶ render ──▶ encode
//! (TempDir)  (pdflatex)  (pdfium)   (JPEG + base64)
//! ```
//!
//! 1. [`source`]: write the request's LaTeX into a private scratch dir
//! 2. [`compile`]: run the engine with a timeout and an exit-status policy
//! 3. [`render`]: rasterise every page; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 4. [`encode`]: JPEG-encode and base64-wrap each page in order

pub mod compile;
pub mod encode;
pub mod render;
pub mod source;
