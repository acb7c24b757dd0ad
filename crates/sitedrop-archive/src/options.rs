use serde::{Deserialize, Serialize};

pub const MIB: u64 = 1024 * 1024;

/// Declared-size ceiling for a single member.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * MIB;

/// Ceiling on decoded bytes written for one archive.
pub const DEFAULT_MAX_EXTRACTED_SIZE: u64 = 500 * MIB;

/// What the extractor does with a member whose path fails sanitization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    /// Abort the whole extraction.
    #[default]
    RejectArchive,
    /// Drop the member, record it in the report and keep going.
    SkipMember,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtractOptions {
    pub max_file_size: u64,
    pub max_extracted_size: u64,
    pub strictness: Strictness,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_extracted_size: DEFAULT_MAX_EXTRACTED_SIZE,
            strictness: Strictness::default(),
        }
    }
}

impl ExtractOptions {
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    pub fn max_extracted_size(mut self, bytes: u64) -> Self {
        self.max_extracted_size = bytes;
        self
    }

    pub fn strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }
}
