use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write '{path}': {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to lock '{path}': {source}")]
    Lock { path: PathBuf, source: io::Error },

    #[error("failed to move '{target}' aside to '{backup}': {source}")]
    Backup {
        target: PathBuf,
        backup: PathBuf,
        source: io::Error,
    },

    #[error("failed to move '{staging}' into '{target}': {source}")]
    Swap {
        staging: PathBuf,
        target: PathBuf,
        source: io::Error,
    },

    /// The swap failed and the previous tree could not be put back.
    /// `backup` still holds the previous tree and `target` may be missing.
    #[error(
        "failed to restore '{backup}' to '{target}' after swap failure ({source}); restore error: {restore}"
    )]
    RestoreFailed {
        target: PathBuf,
        backup: PathBuf,
        source: io::Error,
        restore: io::Error,
    },
}

impl Error {
    /// Whether the error left the filesystem in a state that needs operator repair.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RestoreFailed { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
