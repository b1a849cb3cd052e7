//! Configuration types for LaTeX compilation and page rendering.
//!
//! All pipeline behaviour is controlled through [`RenderConfig`], built via
//! its [`RenderConfigBuilder`]. The HTTP layer wraps it in a
//! [`ServerConfig`] together with the listener settings.

use crate::error::RenderError;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// What to do when the LaTeX compiler exits with a nonzero status.
///
/// `pdflatex -interaction=nonstopmode` routinely exits with status 1 while
/// still writing a usable PDF (a missing glyph, an overfull box promoted to
/// an error by a class file). [`ExitStatusPolicy::Lenient`] accepts such
/// output; [`ExitStatusPolicy::Strict`] rejects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitStatusPolicy {
    /// Nonzero exit is logged; the PDF is used if one was written. (default)
    #[default]
    Lenient,
    /// Any nonzero exit is a [`RenderError::CompilationFailed`].
    Strict,
}

/// Configuration for compiling and rasterising one LaTeX document.
///
/// # Example
/// ```rust
/// use tex2slides::{ExitStatusPolicy, RenderConfig};
///
/// let config = RenderConfig::builder()
///     .latex_program("xelatex")
///     .compile_timeout_secs(30)
///     .exit_status_policy(ExitStatusPolicy::Strict)
///     .build()
///     .unwrap();
/// assert_eq!(config.job_name, "output");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Compiler executable, looked up on PATH. Default: `pdflatex`.
    pub latex_program: String,

    /// Value passed as `-jobname`; the compiler writes `<job_name>.pdf`.
    /// Default: `output`.
    pub job_name: String,

    /// Extra arguments inserted before the source path.
    pub extra_args: Vec<String>,

    /// Wall-clock limit for one compiler run, in seconds. Default: 60.
    ///
    /// The child process is killed when the limit elapses. `\loop` without an
    /// exit condition is a one-line denial of service otherwise.
    pub compile_timeout_secs: u64,

    /// Exit-status handling. Default: [`ExitStatusPolicy::Lenient`].
    pub exit_status_policy: ExitStatusPolicy,

    /// Parent directory for per-request scratch directories.
    /// If None, uses the system temp dir.
    pub scratch_root: Option<PathBuf>,

    /// Rendering DPI. Range: 72–400. Default: 200.
    pub dpi: u32,

    /// Cap on either rendered dimension in pixels. Default: 4000.
    ///
    /// A4 at 200 DPI is 1654 × 2339 px, well under the cap; an A0 poster is
    /// not, and would otherwise allocate hundreds of megabytes per page.
    pub max_rendered_pixels: u32,

    /// JPEG quality, 1–100. Default: 75.
    pub jpeg_quality: u8,

    /// Explicit pdfium library file or directory.
    /// If None, see [`crate::pdfium::bind_pdfium`] for the lookup order.
    pub pdfium_lib_path: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            latex_program: "pdflatex".to_string(),
            job_name: "output".to_string(),
            extra_args: Vec::new(),
            compile_timeout_secs: 60,
            exit_status_policy: ExitStatusPolicy::default(),
            scratch_root: None,
            dpi: 200,
            max_rendered_pixels: 4000,
            jpeg_quality: 75,
            pdfium_lib_path: None,
        }
    }
}

impl RenderConfig {
    /// Create a new builder for `RenderConfig`.
    pub fn builder() -> RenderConfigBuilder {
        RenderConfigBuilder {
            config: Self::default(),
        }
    }

    /// The compile timeout as a [`Duration`].
    pub fn compile_timeout(&self) -> Duration {
        Duration::from_secs(self.compile_timeout_secs)
    }

    /// File name of the PDF the compiler is expected to write.
    pub fn pdf_file_name(&self) -> String {
        format!("{}.pdf", self.job_name)
    }

    /// File name of the compiler's own log.
    pub fn log_file_name(&self) -> String {
        format!("{}.log", self.job_name)
    }

    /// Pixels per PDF point at the configured DPI.
    pub fn scale_factor(&self) -> f32 {
        self.dpi as f32 / 72.0
    }
}

/// Builder for [`RenderConfig`].
#[derive(Debug)]
pub struct RenderConfigBuilder {
    config: RenderConfig,
}

impl RenderConfigBuilder {
    pub fn latex_program(mut self, program: impl Into<String>) -> Self {
        self.config.latex_program = program.into();
        self
    }

    pub fn job_name(mut self, name: impl Into<String>) -> Self {
        self.config.job_name = name.into();
        self
    }

    pub fn extra_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.config.extra_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn compile_timeout_secs(mut self, secs: u64) -> Self {
        self.config.compile_timeout_secs = secs;
        self
    }

    pub fn exit_status_policy(mut self, policy: ExitStatusPolicy) -> Self {
        self.config.exit_status_policy = policy;
        self
    }

    pub fn scratch_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_root = Some(dir.into());
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RenderConfig, RenderError> {
        let c = &self.config;
        if c.latex_program.trim().is_empty() {
            return Err(RenderError::InvalidConfig(
                "LaTeX program must not be empty".into(),
            ));
        }
        if c.job_name.is_empty()
            || !c
                .job_name
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
        {
            return Err(RenderError::InvalidConfig(format!(
                "Job name must be non-empty [A-Za-z0-9_-], got {:?}",
                c.job_name
            )));
        }
        if c.compile_timeout_secs == 0 {
            return Err(RenderError::InvalidConfig(
                "Compile timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Listener and request settings for the HTTP service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind. Default: `0.0.0.0:8000`.
    pub bind: SocketAddr,
    /// Maximum accepted request body in bytes. Default: 2 MiB.
    pub max_body_bytes: usize,
    /// Pipeline settings shared by every request.
    pub render: RenderConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            max_body_bytes: 2 * 1024 * 1024,
            render: RenderConfig::default(),
        }
    }
}
