use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sitedrop_fs::Transaction;

use crate::counter::{ActionKind, Decision, RateLimitCounter};
use crate::error::{Error, Result};

/// Closure run against a single counter slot while the store holds it exclusively.
pub type SlotUpdate<'a, T> = &'a mut dyn FnMut(&mut Option<RateLimitCounter>) -> T;

/// Persistence for rate-limit counters.
///
/// `apply` must run the read, the closure and the write-back as one
/// exclusive unit per record, so two concurrent checks can never both see
/// the same count.
pub trait CounterStore: Send + Sync {
    fn apply(
        &self,
        subject_id: &str,
        action_kind: ActionKind,
        update: SlotUpdate<'_, Decision>,
    ) -> Result<Decision>;

    /// Every stored counter for `subject_id`, expired or not.
    fn counters(&self, subject_id: &str) -> Result<Vec<RateLimitCounter>>;
}

type Key = (String, ActionKind);

/// In-process store. The whole map sits behind one mutex.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    counters: Mutex<HashMap<Key, RateLimitCounter>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CounterStore for MemoryCounterStore {
    fn apply(
        &self,
        subject_id: &str,
        action_kind: ActionKind,
        update: SlotUpdate<'_, Decision>,
    ) -> Result<Decision> {
        let mut counters = self.counters.lock().map_err(|_| Error::Poisoned)?;
        let key = (subject_id.to_owned(), action_kind);
        let mut slot = counters.get(&key).cloned();
        let decision = update(&mut slot);
        match slot {
            Some(counter) => {
                counters.insert(key, counter);
            }
            None => {
                counters.remove(&key);
            }
        }
        Ok(decision)
    }

    fn counters(&self, subject_id: &str) -> Result<Vec<RateLimitCounter>> {
        let counters = self.counters.lock().map_err(|_| Error::Poisoned)?;
        let mut found: Vec<_> = counters
            .values()
            .filter(|c| c.subject_id == subject_id)
            .cloned()
            .collect();
        found.sort_by_key(|c| c.action_kind);
        Ok(found)
    }
}

/// JSON file store shared by every process on the node.
///
/// Each `apply` holds an exclusive file lock for the whole
/// read-modify-write and persists with an atomic rename.
#[derive(Debug, Clone)]
pub struct FileCounterStore {
    path: PathBuf,
}

impl FileCounterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self, tx: &Transaction) -> Result<Vec<RateLimitCounter>> {
        match tx.read()? {
            None => Ok(Vec::new()),
            Some(bytes) if bytes.is_empty() => Ok(Vec::new()),
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| Error::Corrupt {
                path: self.path.clone(),
                source: e,
            }),
        }
    }
}

impl CounterStore for FileCounterStore {
    fn apply(
        &self,
        subject_id: &str,
        action_kind: ActionKind,
        update: SlotUpdate<'_, Decision>,
    ) -> Result<Decision> {
        let tx = Transaction::open_locked(&self.path)?;
        let mut counters = self.load(&tx)?;

        let position = counters
            .iter()
            .position(|c| c.subject_id == subject_id && c.action_kind == action_kind);
        let mut slot = position.map(|i| counters[i].clone());
        let before = slot.clone();
        let decision = update(&mut slot);

        if slot != before {
            match (position, slot) {
                (Some(i), Some(counter)) => counters[i] = counter,
                (Some(i), None) => {
                    counters.remove(i);
                }
                (None, Some(counter)) => counters.push(counter),
                (None, None) => {}
            }
            let bytes = serde_json::to_vec_pretty(&counters).map_err(|e| Error::Corrupt {
                path: self.path.clone(),
                source: e,
            })?;
            tx.write(&bytes)?;
        }

        Ok(decision)
    }

    fn counters(&self, subject_id: &str) -> Result<Vec<RateLimitCounter>> {
        let tx = Transaction::open_locked(&self.path)?;
        let mut found: Vec<_> = self
            .load(&tx)?
            .into_iter()
            .filter(|c| c.subject_id == subject_id)
            .collect();
        found.sort_by_key(|c| c.action_kind);
        Ok(found)
    }
}
