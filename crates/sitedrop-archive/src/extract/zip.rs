use std::io::{Cursor, Read, Seek};

use crate::entry::{ArchiveMember, is_symlink_mode};
use crate::error::{Error, Result};
use crate::format;

/// Decodes every member of a ZIP container into memory.
pub struct ZipSource<R: Read + Seek> {
    archive: ::zip::ZipArchive<R>,
}

impl<R: Read + Seek> ZipSource<R> {
    pub fn new(reader: R) -> Result<Self> {
        let archive = ::zip::ZipArchive::new(reader).map_err(|e| Error::Corrupted {
            reason: e.to_string(),
        })?;
        Ok(Self { archive })
    }

    /// Decode all members, stopping as soon as decoded bytes pass `max_decoded`.
    ///
    /// Names are returned raw; sanitizing them is the extractor's job.
    pub fn read_members(mut self, max_decoded: u64) -> Result<Vec<ArchiveMember>> {
        let mut members = Vec::with_capacity(self.archive.len());
        let mut decoded = 0u64;

        for index in 0..self.archive.len() {
            let mut file = self.archive.by_index(index).map_err(|e| Error::Corrupted {
                reason: e.to_string(),
            })?;

            let name = file.name().to_owned();
            let declared_size = file.size();
            let is_directory = file.is_dir();
            let is_symlink = file.unix_mode().is_some_and(is_symlink_mode);

            // One byte past the remaining budget is enough to prove the overrun.
            let budget = max_decoded.saturating_sub(decoded).saturating_add(1);
            let mut content = Vec::new();
            file.by_ref()
                .take(budget)
                .read_to_end(&mut content)
                .map_err(|e| Error::Corrupted {
                    reason: format!("{name}: {e}"),
                })?;

            decoded = decoded.saturating_add(content.len() as u64);
            if decoded > max_decoded {
                tracing::warn!(entry = %name, declared_size, decoded, "decoded size over ceiling");
                return Err(Error::ExtractedSizeExceeded {
                    limit: max_decoded,
                    total: decoded,
                });
            }

            members.push(ArchiveMember {
                name,
                declared_size,
                is_directory,
                is_symlink,
                content,
            });
        }

        Ok(members)
    }
}

/// Check the magic bytes, then decode an in-memory upload.
pub fn read_members_from_bytes(data: &[u8], max_decoded: u64) -> Result<Vec<ArchiveMember>> {
    format::ensure_zip(data)?;
    ZipSource::new(Cursor::new(data))?.read_members(max_decoded)
}
