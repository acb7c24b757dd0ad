use std::path::PathBuf;

use serde::Serialize;

/// `S_IFMT` / `S_IFLNK` from the Unix mode stored in a ZIP entry's external attributes.
const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

/// One member of an uploaded archive, fully decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveMember {
    pub name: String,
    pub declared_size: u64,
    pub is_directory: bool,
    pub is_symlink: bool,
    pub content: Vec<u8>,
}

impl ArchiveMember {
    pub fn file(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        let content = content.into();
        Self {
            name: name.into(),
            declared_size: content.len() as u64,
            is_directory: false,
            is_symlink: false,
            content,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_size: 0,
            is_directory: true,
            is_symlink: false,
            content: Vec::new(),
        }
    }

    pub fn symlink(name: impl Into<String>, target: impl Into<Vec<u8>>) -> Self {
        Self {
            is_symlink: true,
            ..Self::file(name, target)
        }
    }

    /// Override the size recorded in the archive directory.
    pub fn with_declared_size(mut self, size: u64) -> Self {
        self.declared_size = size;
        self
    }

    /// Files and symlinks; directories are implied by their children.
    pub fn is_eligible(&self) -> bool {
        !self.is_directory
    }

    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }
}

pub fn is_symlink_mode(mode: u32) -> bool {
    mode & S_IFMT == S_IFLNK
}

/// One file written into the staging directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExtractedEntry {
    pub original_name: String,
    pub relative_path: PathBuf,
    pub size: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveReport {
    pub entry_count: usize,
    pub total_bytes: u64,
    pub entries: Vec<ExtractedEntry>,
    /// Members dropped under [`crate::Strictness::SkipMember`].
    pub skipped: Vec<String>,
}
