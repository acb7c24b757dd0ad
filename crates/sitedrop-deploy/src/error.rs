use std::fmt;
use std::path::PathBuf;

/// Which ceiling a [`PipelineError::ResourceLimit`] hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LimitKind {
    DailyRate,
    ExtractedSize,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DailyRate => "daily rate limit",
            Self::ExtractedSize => "extracted size limit",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Malformed request. Nothing was touched.
    #[error("{message}")]
    Input { message: String },

    /// The archive breaks naming, type, size or content rules. Nothing was touched.
    #[error("Invalid ZIP structure: {}", .errors.join("; "))]
    Validation { errors: Vec<String> },

    /// Retry later (rate) or shrink the upload (size). Nothing was published.
    #[error("{message}")]
    ResourceLimit { kind: LimitKind, message: String },

    /// I/O failure while staging. The staging directory has been removed.
    #[error("extraction failed: {source}")]
    Extraction { source: sitedrop_archive::Error },

    /// A rename in the swap failed. The previous tree is back in place.
    #[error("publish failed: {source}")]
    Publish { source: sitedrop_fs::Error },

    /// The swap failed and the previous tree could not be restored.
    #[error("publish left '{target}' inconsistent; previous tree is at '{backup}': {source}")]
    FatalInconsistency {
        target: PathBuf,
        backup: PathBuf,
        source: sitedrop_fs::Error,
    },

    #[error("rate limit store failed: {source}")]
    RateStore { source: sitedrop_rate::Error },
}

impl PipelineError {
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
        }
    }

    /// HTTP-equivalent status for transport layers.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Input { .. } | Self::Validation { .. } => 400,
            Self::ResourceLimit {
                kind: LimitKind::DailyRate,
                ..
            } => 429,
            Self::ResourceLimit { .. } => 413,
            Self::Extraction { .. }
            | Self::Publish { .. }
            | Self::FatalInconsistency { .. }
            | Self::RateStore { .. } => 500,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalInconsistency { .. })
    }

    /// Diagnostics suitable for showing to the uploader.
    pub fn details(&self) -> Vec<String> {
        match self {
            Self::Validation { errors } => errors.clone(),
            other => vec![other.to_string()],
        }
    }

    pub(crate) fn from_publish(source: sitedrop_fs::Error) -> Self {
        if let sitedrop_fs::Error::RestoreFailed { target, backup, .. } = &source {
            let (target, backup) = (target.clone(), backup.clone());
            return Self::FatalInconsistency {
                target,
                backup,
                source,
            };
        }
        Self::Publish { source }
    }
}

impl From<sitedrop_archive::Error> for PipelineError {
    fn from(e: sitedrop_archive::Error) -> Self {
        use sitedrop_archive::Error as ArchiveError;

        match e {
            e if e.is_validation() => Self::Validation {
                errors: vec![e.to_string()],
            },
            e if e.is_resource_limit() => Self::ResourceLimit {
                kind: LimitKind::ExtractedSize,
                message: e.to_string(),
            },
            ArchiveError::UnsupportedFormat { .. } | ArchiveError::Corrupted { .. } => {
                Self::input(e.to_string())
            }
            ArchiveError::WorkspaceFailed { source }
                if matches!(
                    source,
                    sitedrop_fs::Error::Backup { .. }
                        | sitedrop_fs::Error::Swap { .. }
                        | sitedrop_fs::Error::RestoreFailed { .. }
                ) =>
            {
                Self::from_publish(source)
            }
            e => Self::Extraction { source: e },
        }
    }
}

impl From<sitedrop_rate::Error> for PipelineError {
    fn from(e: sitedrop_rate::Error) -> Self {
        Self::RateStore { source: e }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
