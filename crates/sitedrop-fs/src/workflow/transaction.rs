use crate::{Error, Result};
use fs2::FileExt;
use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Exclusive read-modify-write access to a data file.
///
/// The lock is held on a `<path>.lock` sidecar rather than the data file,
/// because [`Transaction::write`] replaces the data file by rename and a lock
/// on the old inode would not exclude a process opening the new one.
/// The lock is released on drop.
pub struct Transaction {
    lock: File,
    path: PathBuf,
}

impl Transaction {
    fn lock_path(path: &Path) -> PathBuf {
        let mut name: OsString = path.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn open(path: &Path) -> Result<File> {
        let lock_path = Self::lock_path(path);
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| Error::Lock {
                path: lock_path,
                source: e,
            })
    }

    /// Block until the exclusive lock is acquired.
    pub fn open_locked(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let lock = Self::open(&path)?;
        lock.lock_exclusive().map_err(|e| Error::Lock {
            path: path.clone(),
            source: e,
        })?;
        Ok(Self { lock, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current content, or `None` if the data file has never been written.
    pub fn read(&self) -> Result<Option<Vec<u8>>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Read {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    pub fn write(&self, data: &[u8]) -> Result<()> {
        crate::atomic_write(&self.path, data, crate::AtomicWriteOptions::new().sync(true))
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.lock);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_transaction_read_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("counters.json");
        let tx = Transaction::open_locked(&path).unwrap();
        assert_eq!(tx.read().unwrap(), None);
        tx.write(b"data").unwrap();
        assert_eq!(tx.read().unwrap().as_deref(), Some(&b"data"[..]));
    }

    #[test]
    fn test_transaction_excludes_second_holder() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("counters.json");
        let held = Transaction::open_locked(&path).unwrap();
        let acquired = AtomicBool::new(false);

        std::thread::scope(|scope| {
            let waiter = scope.spawn(|| {
                let tx = Transaction::open_locked(&path).unwrap();
                acquired.store(true, Ordering::SeqCst);
                tx.write(b"second").unwrap();
            });
            std::thread::sleep(Duration::from_millis(100));
            assert!(!acquired.load(Ordering::SeqCst));
            held.write(b"first").unwrap();
            drop(held);
            waiter.join().unwrap();
        });

        assert!(acquired.load(Ordering::SeqCst));
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
    }
}
