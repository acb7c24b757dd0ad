use crate::error::{Error, Result};

/// Container formats recognised by their leading magic bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Gzip,
    Zstd,
    Xz,
}

impl ArchiveFormat {
    pub fn name(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Gzip => "gzip",
            Self::Zstd => "zstd",
            Self::Xz => "xz",
        }
    }
}

pub fn detect_format(data: &[u8]) -> Option<ArchiveFormat> {
    match data {
        // Local file header, or the end-of-central-directory record of an empty archive.
        [0x50, 0x4B, 0x03, 0x04, ..] | [0x50, 0x4B, 0x05, 0x06, ..] => Some(ArchiveFormat::Zip),
        [0x1F, 0x8B, ..] => Some(ArchiveFormat::Gzip),
        [0x28, 0xB5, 0x2F, 0xFD, ..] => Some(ArchiveFormat::Zstd),
        [0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00, ..] => Some(ArchiveFormat::Xz),
        _ => None,
    }
}

/// Only ZIP uploads are accepted; anything else is reported with what it looked like.
pub fn ensure_zip(data: &[u8]) -> Result<()> {
    match detect_format(data) {
        Some(ArchiveFormat::Zip) => Ok(()),
        other => Err(Error::UnsupportedFormat {
            detected: other.map(ArchiveFormat::name),
        }),
    }
}
