//! Result types returned by the conversion entry points.

use serde::{Deserialize, Serialize};

/// The slides for one document, in page order.
///
/// Serialises to the HTTP response body `{"slides": [...]}`; the stats are
/// logged but not sent to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlidesOutput {
    /// Base64 JPEG per page; index `i` is page `i + 1`.
    pub slides: Vec<String>,
    #[serde(skip)]
    pub stats: RenderStats,
}

/// Timing and size figures for one conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderStats {
    pub page_count: usize,
    /// Compiler exit code; nonzero is possible under the lenient policy.
    pub compiler_exit_code: Option<i32>,
    pub compile_duration_ms: u64,
    pub render_duration_ms: u64,
    pub encode_duration_ms: u64,
    pub total_duration_ms: u64,
    /// Sum of the base64 payload lengths.
    pub encoded_bytes: usize,
}

/// A compiled PDF read out of its scratch directory.
#[derive(Debug, Clone)]
pub struct PdfOutput {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub compiler_exit_code: Option<i32>,
}
