use crate::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

#[derive(Clone, Copy, Debug, Default)]
pub struct AtomicWriteOptions {
    pub sync: bool,
}

impl AtomicWriteOptions {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }
}

/// Write `content` to a sibling temp file, then rename it over `path`.
///
/// Readers observe either the old content or the new content, never a
/// truncated file.
pub fn atomic_write(
    path: impl AsRef<Path>,
    content: &[u8],
    options: AtomicWriteOptions,
) -> Result<()> {
    let path = path.as_ref();
    let parent = path.parent().ok_or_else(|| Error::Write {
        path: path.to_path_buf(),
        source: std::io::Error::other("no parent directory"),
    })?;

    let tmp_path = parent.join(format!(".tmp.{}.sitedrop", uuid::Uuid::new_v4()));

    let write_tmp = || -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(content)?;
        if options.sync {
            file.sync_all()?;
        }
        Ok(())
    };

    if let Err(source) = write_tmp() {
        let _ = fs::remove_file(&tmp_path);
        return Err(Error::Write {
            path: tmp_path,
            source,
        });
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        Error::Write {
            path: path.to_path_buf(),
            source: e,
        }
    })
}

pub fn atomic_read(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    fs::read(path).map_err(|e| Error::Read {
        path: path.to_path_buf(),
        source: e,
    })
}
