use crate::{Error, Result};
use std::fs;
use std::path::Path;

/// Recursively copy a directory tree.
///
/// Symlinks are not followed and not recreated; they are skipped with a
/// warning so a copied tree can never point outside itself.
pub fn copy_dir_all(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<()> {
    let src = src.as_ref();
    let dest = dest.as_ref();

    fs::create_dir_all(dest).map_err(|e| Error::Write {
        path: dest.to_path_buf(),
        source: e,
    })?;

    for entry in fs::read_dir(src).map_err(|e| Error::Read {
        path: src.to_path_buf(),
        source: e,
    })? {
        let entry = entry.map_err(|e| Error::Read {
            path: src.to_path_buf(),
            source: e,
        })?;
        let file_type = entry.file_type().map_err(|e| Error::Read {
            path: entry.path(),
            source: e,
        })?;

        let src_path = entry.path();
        let dest_path = dest.join(entry.file_name());

        if file_type.is_dir() {
            copy_dir_all(&src_path, &dest_path)?;
        } else if file_type.is_symlink() {
            tracing::warn!(path = %src_path.display(), "skipping symlink while copying tree");
        } else {
            fs::copy(&src_path, &dest_path).map_err(|e| Error::Write {
                path: dest_path,
                source: e,
            })?;
        }
    }
    Ok(())
}
