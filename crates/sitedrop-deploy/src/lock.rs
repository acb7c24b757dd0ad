//! Per-subject publish exclusion.
//!
//! Threads in one process wait on a condition variable; separate processes on
//! the same node are serialized by an advisory file lock under `locks/`.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Condvar, Mutex};

use sitedrop_fs::Transaction;

use crate::error::{PipelineError, Result};

#[derive(Debug)]
pub struct SubjectLocks {
    dir: PathBuf,
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

impl SubjectLocks {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            held: Mutex::new(HashSet::new()),
            released: Condvar::new(),
        }
    }

    /// Block until `subject_id` is free, then hold it until the guard drops.
    pub fn acquire(&self, subject_id: &str) -> Result<SubjectGuard<'_>> {
        {
            let mut held = self.held.lock().map_err(|_| poisoned())?;
            while held.contains(subject_id) {
                held = self.released.wait(held).map_err(|_| poisoned())?;
            }
            held.insert(subject_id.to_owned());
        }

        // Registered before the file lock so a failure below still releases the slot.
        let mut guard = SubjectGuard {
            locks: self,
            subject_id: subject_id.to_owned(),
            file: None,
        };
        let file = Transaction::open_locked(self.dir.join(subject_id))
            .map_err(PipelineError::from_publish)?;
        guard.file = Some(file);
        tracing::debug!(subject = subject_id, "publish lock acquired");
        Ok(guard)
    }
}

fn poisoned() -> PipelineError {
    PipelineError::from_publish(sitedrop_fs::Error::Lock {
        path: PathBuf::from("<subject registry>"),
        source: std::io::Error::other("lock registry poisoned"),
    })
}

/// Holds one subject's publish slot.
pub struct SubjectGuard<'a> {
    locks: &'a SubjectLocks,
    subject_id: String,
    file: Option<Transaction>,
}

impl SubjectGuard<'_> {
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }
}

impl Drop for SubjectGuard<'_> {
    fn drop(&mut self) {
        // File lock first, so another process never sees it held after we stop waiting.
        self.file.take();
        if let Ok(mut held) = self.locks.held.lock() {
            held.remove(&self.subject_id);
        }
        self.locks.released.notify_all();
    }
}
