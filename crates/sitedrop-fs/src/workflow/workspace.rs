use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// A disposable staging directory.
///
/// The directory is removed when the workspace is dropped, whatever the exit
/// path. Committing renames it away first, so a committed workspace leaves
/// nothing behind to remove.
#[derive(Debug)]
pub struct Workspace {
    staging_path: PathBuf,
}

impl Workspace {
    /// Create a fresh staging directory. Fails if `staging_dir` already exists.
    pub fn new(staging_dir: impl AsRef<Path>) -> Result<Self> {
        let staging_path = staging_dir.as_ref().to_path_buf();

        if let Some(parent) = staging_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        std::fs::create_dir(&staging_path).map_err(|e| Error::Write {
            path: staging_path.clone(),
            source: e,
        })?;

        Ok(Self { staging_path })
    }

    pub fn path(&self) -> &Path {
        &self.staging_path
    }

    /// Swap the staged tree into `destination`, see [`crate::swap_dir`].
    pub fn commit(self, destination: impl AsRef<Path>) -> Result<crate::Swapped> {
        self.commit_with(&crate::StdDirOps, destination)
    }

    pub fn commit_with<O: crate::DirOps>(
        self,
        ops: &O,
        destination: impl AsRef<Path>,
    ) -> Result<crate::Swapped> {
        let destination = destination.as_ref();
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        crate::swap_dir_with(ops, &self.staging_path, destination)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.staging_path.symlink_metadata().is_ok()
            && let Err(e) = std::fs::remove_dir_all(&self.staging_path)
        {
            tracing::warn!(
                path = %self.staging_path.display(),
                error = %e,
                "failed to remove staging directory"
            );
        }
    }
}
