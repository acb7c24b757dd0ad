//! Rename-based directory swap with backup and rollback.
//!
//! The only operations performed on `target` itself are renames, so a reader
//! looking at `target` sees either the complete old tree or the complete new
//! tree. Renames are atomic only within one filesystem; callers must keep the
//! staging directory on the same mount as the target.

use crate::{Error, Result};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

/// Directory operations used by [`swap_dir_with`].
///
/// [`StdDirOps`] forwards to `std::fs`; tests substitute an implementation
/// that fails at a chosen step.
pub trait DirOps {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;
    fn exists(&self, path: &Path) -> bool {
        path.symlink_metadata().is_ok()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct StdDirOps;

impl DirOps for StdDirOps {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir_all(path)
    }
}

/// Outcome of a successful swap.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Swapped {
    /// Where the previous tree was parked, if there was one.
    pub backup: Option<PathBuf>,
    /// The backup could not be removed after the swap and is still on disk.
    pub backup_left_behind: bool,
}

/// `<target>.backup.<unix-millis>`, with a numeric suffix if that name is taken.
pub fn backup_path(target: &Path) -> PathBuf {
    backup_path_with(&StdDirOps, target)
}

fn backup_path_with<O: DirOps>(ops: &O, target: &Path) -> PathBuf {
    let stamp = chrono::Utc::now().timestamp_millis();
    let mut name: OsString = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("target"));
    name.push(format!(".backup.{stamp}"));
    let base = target.with_file_name(&name);

    let mut candidate = base.clone();
    let mut n = 1u32;
    while ops.exists(&candidate) {
        let mut bumped = name.clone();
        bumped.push(format!(".{n}"));
        candidate = base.with_file_name(bumped);
        n += 1;
    }
    candidate
}

/// Replace `target` with `staging` using the standard filesystem.
pub fn swap_dir(staging: impl AsRef<Path>, target: impl AsRef<Path>) -> Result<Swapped> {
    swap_dir_with(&StdDirOps, staging.as_ref(), target.as_ref())
}

/// Replace `target` with `staging`.
///
/// 1. park the existing target at a fresh backup path (a missing target is fine),
/// 2. rename staging into target, restoring the backup if that fails,
/// 3. remove the backup.
///
/// On `Err`, `target` holds exactly what it held before the call unless the
/// error is [`Error::RestoreFailed`].
pub fn swap_dir_with<O: DirOps>(ops: &O, staging: &Path, target: &Path) -> Result<Swapped> {
    let backup = backup_path_with(ops, target);

    let parked = match ops.rename(target, &backup) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(source) => {
            return Err(Error::Backup {
                target: target.to_path_buf(),
                backup,
                source,
            });
        }
    };

    if let Err(source) = ops.rename(staging, target) {
        if !parked {
            return Err(Error::Swap {
                staging: staging.to_path_buf(),
                target: target.to_path_buf(),
                source,
            });
        }
        return match ops.rename(&backup, target) {
            Ok(()) => Err(Error::Swap {
                staging: staging.to_path_buf(),
                target: target.to_path_buf(),
                source,
            }),
            Err(restore) => {
                tracing::error!(
                    fatal = true,
                    target = %target.display(),
                    backup = %backup.display(),
                    error = %restore,
                    "could not restore previous tree after failed swap; manual repair required"
                );
                Err(Error::RestoreFailed {
                    target: target.to_path_buf(),
                    backup,
                    source,
                    restore,
                })
            }
        };
    }

    if !parked {
        return Ok(Swapped::default());
    }

    let backup_left_behind = match ops.remove_dir_all(&backup) {
        Ok(()) => false,
        Err(e) => {
            tracing::warn!(backup = %backup.display(), error = %e, "failed to remove swap backup");
            true
        }
    };

    Ok(Swapped {
        backup: Some(backup),
        backup_left_behind,
    })
}
