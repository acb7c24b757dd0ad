use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("counter store failed: {source}")]
    Store { source: sitedrop_fs::Error },

    #[error("counter file '{path}' is not valid: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("counter store lock poisoned")]
    Poisoned,
}

impl From<sitedrop_fs::Error> for Error {
    fn from(e: sitedrop_fs::Error) -> Self {
        Self::Store { source: e }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
