use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported archive format{}", .detected.map(|d| format!(" ({d})")).unwrap_or_default())]
    UnsupportedFormat { detected: Option<&'static str> },

    #[error("archive is corrupted: {reason}")]
    Corrupted { reason: String },

    #[error("entry name is empty or contains a null byte: {entry:?}")]
    InvalidPath { entry: String },

    #[error("entry '{entry}' is an absolute path")]
    AbsolutePath { entry: String },

    #[error("zip-slip attack detected: entry '{entry}' resolves to '{resolved}'")]
    ZipSlip { entry: String, resolved: PathBuf },

    #[error("symlinks are not allowed in archives: '{entry}'")]
    Symlink { entry: String },

    #[error("entry '{entry}' uses a path that is both a file and a directory")]
    PathConflict { entry: String },

    #[error("{reason}")]
    DangerousContent { entry: String, reason: String },

    #[error(
        "extracted size exceeds maximum limit of {} MiB ({total} bytes decoded); possible decompression bomb",
        .limit / (1024 * 1024)
    )]
    ExtractedSizeExceeded { limit: u64, total: u64 },

    #[error("failed to extract '{path}': {source}")]
    ExtractionFailed { path: PathBuf, source: io::Error },

    #[error("failed to create directory: {path}: {source}")]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    #[error("workspace operation failed: {source}")]
    WorkspaceFailed { source: sitedrop_fs::Error },
}

impl Error {
    /// Rejections caused by what the archive contains, as opposed to I/O trouble.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidPath { .. }
                | Self::AbsolutePath { .. }
                | Self::ZipSlip { .. }
                | Self::Symlink { .. }
                | Self::PathConflict { .. }
                | Self::DangerousContent { .. }
        )
    }

    pub fn is_resource_limit(&self) -> bool {
        matches!(self, Self::ExtractedSizeExceeded { .. })
    }
}

impl From<sitedrop_fs::Error> for Error {
    fn from(e: sitedrop_fs::Error) -> Self {
        Self::WorkspaceFailed { source: e }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
