//! Source materialisation: write LaTeX text into a private scratch directory.
//!
//! Every request gets its own `TempDir`. The compiler writes its `.aux`,
//! `.log` and `.pdf` next to the source, so sharing a directory between two
//! requests would let one request read the other's PDF. The directory is
//! removed when the returned [`Workspace`] is dropped, even on panic.

use crate::error::RenderError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// File name of the materialised source inside the scratch directory.
pub const SOURCE_FILE_NAME: &str = "input.tex";

/// A scratch directory holding exactly one LaTeX source file.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    source_path: PathBuf,
}

impl Workspace {
    /// The scratch directory; used as the compiler's working directory.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Path to the materialised `input.tex`.
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Path of an artifact inside the scratch directory.
    pub fn artifact(&self, file_name: &str) -> PathBuf {
        self.dir.path().join(file_name)
    }
}

/// Write `source` verbatim into a fresh scratch directory.
///
/// The text is not inspected: empty or malformed input is written as-is and
/// left for the compiler to reject.
pub async fn materialize(source: &str, scratch_root: Option<&Path>) -> Result<Workspace, RenderError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("tex2slides-");

    let dir = match scratch_root {
        Some(root) => {
            tokio::fs::create_dir_all(root)
                .await
                .map_err(|e| RenderError::Materialize {
                    path: root.to_path_buf(),
                    source: e,
                })?;
            builder.tempdir_in(root)
        }
        None => builder.tempdir(),
    }
    .map_err(|e| RenderError::Materialize {
        path: scratch_root
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir),
        source: e,
    })?;

    let source_path = dir.path().join(SOURCE_FILE_NAME);
    tokio::fs::write(&source_path, source)
        .await
        .map_err(|e| RenderError::Materialize {
            path: source_path.clone(),
            source: e,
        })?;

    debug!(
        "Wrote {} bytes of LaTeX source to {}",
        source.len(),
        source_path.display()
    );

    Ok(Workspace { dir, source_path })
}
