//! Temporary single-record artifacts handed to and from the external tool.
//!
//! Artifacts are removed explicitly by the stage that consumes them; nothing here cleans up on drop.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::engine::naming::construct_output_path;
use crate::error::PipelineError;
use crate::utils::config::PackagePaths;

/// Run-scoped scratch directory holding every artifact of one pipeline run.
pub struct ArtifactDir {
    dir: TempDir,
}

impl ArtifactDir {
    /// Create a scratch directory under the system temp dir.
    pub fn new() -> Result<Self, PipelineError> {
        Self::new_in(std::env::temp_dir())
    }

    /// Create a scratch directory under `parent`.
    pub fn new_in(parent: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let parent = parent.as_ref();
        let dir = tempfile::Builder::new()
            .prefix(PackagePaths::get().scratch_prefix())
            .tempdir_in(parent)
            .map_err(|source| PipelineError::Artifact {
                path: parent.to_path_buf(),
                source,
            })?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Reserve a new uniquely named, empty artifact with the given suffix (e.g. `.mol`).
    pub fn create(&self, suffix: &str) -> io::Result<Artifact> {
        let path = tempfile::Builder::new()
            .prefix(PackagePaths::get().artifact_prefix())
            .suffix(suffix)
            .tempfile_in(self.dir.path())?
            .into_temp_path()
            .keep()
            .map_err(|e| e.error)?;
        Ok(Artifact { path })
    }

    /// Number of files currently held. Zero after a clean run.
    pub fn remaining(&self) -> usize {
        fs::read_dir(self.dir.path())
            .map(|rd| rd.filter_map(|e| e.ok()).count())
            .unwrap_or(0)
    }
}

/// A transient file exclusively owned by the stage holding it.
#[derive(Debug, PartialEq, Eq)]
pub struct Artifact {
    path: PathBuf,
}

impl Artifact {
    /// Take ownership of a file some collaborator already wrote (e.g. converter output).
    pub fn adopt(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path for the converted artifact next to this one. Never an existing file.
    pub fn output_path(&self, conformers: u32) -> PathBuf {
        construct_output_path(&self.path, conformers)
    }

    pub fn remove(self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// Remove and log instead of failing. Used on cleanup paths.
    pub fn discard(self) {
        let path = self.path.clone();
        if let Err(e) = self.remove() {
            log::warn!("could not remove artifact {}: {}", path.display(), e);
        }
    }
}
