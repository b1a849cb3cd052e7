//! Locating and binding the pdfium shared library.
//!
//! `pdfium-render` loads pdfium dynamically at runtime. Lookup order:
//!
//! 1. `RenderConfig::pdfium_lib_path` (a library file, or a directory that
//!    contains the platform library name)
//! 2. the `PDFIUM_LIB_PATH` environment variable (same rules)
//! 3. the platform library in the current working directory
//! 4. the system library search path
//!
//! pdfium's bindings are process-global, so the render stage goes through
//! [`shared_pdfium`]: the first successful binding is kept for the lifetime
//! of the process and later `pdfium_lib_path` values are ignored. Binding a
//! second time is refused by `pdfium-render`, so there is exactly one handle.
//! Keeping it in a `static` needs `Pdfium: Send + Sync`, which the `sync`
//! feature provides; `thread_safe` serialises the calls into the library.

use crate::error::RenderError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError};
use tracing::{debug, info};

/// Environment variable naming an existing pdfium library.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

static PDFIUM: OnceLock<Pdfium> = OnceLock::new();
static BIND_LOCK: Mutex<()> = Mutex::new(());

/// The process-wide pdfium handle, binding it on first use.
///
/// A failed binding is not cached: the next call tries again, so installing
/// the library does not require a restart.
pub fn shared_pdfium(lib_path: Option<&Path>) -> Result<&'static Pdfium, RenderError> {
    if let Some(pdfium) = PDFIUM.get() {
        return Ok(pdfium);
    }

    let _guard = BIND_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(pdfium) = PDFIUM.get() {
        return Ok(pdfium);
    }

    let pdfium = bind_pdfium(lib_path)?;
    info!("pdfium bound");
    Ok(PDFIUM.get_or_init(|| pdfium))
}

/// Bind to pdfium, trying each location in turn.
pub fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, RenderError> {
    let mut attempts: Vec<String> = Vec::new();

    let explicit = lib_path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(PDFIUM_LIB_PATH_ENV).map(PathBuf::from));

    if let Some(path) = explicit {
        let file = library_file(&path);
        return bind_pdfium_from_path(&file);
    }

    let local = Pdfium::pdfium_platform_library_name_at_path("./");
    match Pdfium::bind_to_library(&local) {
        Ok(bindings) => {
            debug!("Bound pdfium from {}", local.display());
            return Ok(Pdfium::new(bindings));
        }
        Err(e) => attempts.push(format!("{}: {:?}", local.display(), e)),
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => {
            debug!("Bound pdfium from system library path");
            Ok(Pdfium::new(bindings))
        }
        Err(e) => {
            attempts.push(format!("system library: {:?}", e));
            Err(RenderError::PdfiumBindingFailed(attempts.join("; ")))
        }
    }
}

/// Bind to a pdfium library at an explicit `path`.
pub fn bind_pdfium_from_path(path: &Path) -> Result<Pdfium, RenderError> {
    Pdfium::bind_to_library(path)
        .map(Pdfium::new)
        .map_err(|e| RenderError::PdfiumBindingFailed(format!("{}: {:?}", path.display(), e)))
}

/// Resolve a directory to the platform library file inside it.
fn library_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(path)
    } else {
        path.to_path_buf()
    }
}
