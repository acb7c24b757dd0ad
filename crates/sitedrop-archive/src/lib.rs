//! Untrusted ZIP handling: decoding, validation, content scanning and staged extraction.
//!
//! # Architecture
//!
//! - `format.rs` - Magic-byte detection, only ZIP is accepted
//! - `extract/zip.rs` - Decodes members into memory under a byte ceiling
//! - `validate.rs` - Exhaustive structural validation (names, types, sizes)
//! - `scan.rs` - Content signatures for server-side and script payloads
//! - `sanitize.rs` - Path sanitization (zip-slip prevention)
//! - `extract.rs` - Writes members into a staging workspace

pub use entry::{ArchiveMember, ArchiveReport, ExtractedEntry};
pub use error::{Error, Result};
pub use extract::{WorkspaceExtraction, ZipSource, extract_to_workspace, read_members_from_bytes};
pub use format::{ArchiveFormat, detect_format, ensure_zip};
pub use options::{
    DEFAULT_MAX_EXTRACTED_SIZE, DEFAULT_MAX_FILE_SIZE, ExtractOptions, MIB, Strictness,
};
pub use sanitize::{SanitizedPath, sanitize_member, sanitize_path};
pub use scan::{scan_content, scan_members};
pub use validate::{
    ValidationResult, file_extension, is_allowed_file_type, sanitize_file_name, validate_members,
};

pub mod entry;
mod error;
pub mod extract;
mod format;
pub mod options;
mod sanitize;
mod scan;
pub mod validate;
