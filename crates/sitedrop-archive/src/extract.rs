//! Staged extraction of validated members.

use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use sitedrop_fs::{DirOps, StdDirOps, Swapped, Workspace};

use crate::entry::{ArchiveMember, ArchiveReport, ExtractedEntry};
use crate::error::{Error, Result};
use crate::options::{ExtractOptions, Strictness};
use crate::sanitize::sanitize_member;

mod zip;

pub use self::zip::{ZipSource, read_members_from_bytes};

/// A populated staging directory waiting to be published.
///
/// Dropping it (or calling [`abort`](Self::abort)) removes the staging tree.
#[derive(Debug)]
pub struct WorkspaceExtraction {
    workspace: Workspace,
    report: ArchiveReport,
}

impl WorkspaceExtraction {
    pub fn commit(self, destination: &Path) -> Result<(ArchiveReport, Swapped)> {
        self.commit_with(&StdDirOps, destination)
    }

    pub fn commit_with<O: DirOps>(
        self,
        ops: &O,
        destination: &Path,
    ) -> Result<(ArchiveReport, Swapped)> {
        let swapped = self.workspace.commit_with(ops, destination)?;
        Ok((self.report, swapped))
    }

    pub fn abort(self) {
        drop(self.workspace);
    }

    pub fn report(&self) -> &ArchiveReport {
        &self.report
    }

    pub fn path(&self) -> &Path {
        self.workspace.path()
    }
}

/// Write every file member under a fresh `staging_dir`.
///
/// Any error removes the staging directory before returning. The running
/// total of bytes written is checked against `max_extracted_size` before each
/// write, regardless of what the archive declared.
pub fn extract_to_workspace(
    members: &[ArchiveMember],
    staging_dir: &Path,
    options: &ExtractOptions,
) -> Result<WorkspaceExtraction> {
    let workspace = Workspace::new(staging_dir)?;
    let mut report = ArchiveReport::default();
    let mut tree = StagedTree::default();

    for member in members {
        if member.is_directory {
            continue;
        }

        let sanitized = match sanitize_member(member, workspace.path()) {
            Ok(s) if s.relative.as_os_str().is_empty() => Err(Error::InvalidPath {
                entry: member.name.clone(),
            }),
            other => other,
        };
        let sanitized = match sanitized {
            Ok(s) => s,
            Err(e @ Error::Symlink { .. }) => return Err(e),
            Err(e) if options.strictness == Strictness::SkipMember => {
                tracing::warn!(entry = %member.name, error = %e, "skipping member");
                report.skipped.push(member.name.clone());
                continue;
            }
            Err(e) => return Err(e),
        };

        let size = member.content.len() as u64;
        let total = report.total_bytes.saturating_add(size);
        if total > options.max_extracted_size {
            tracing::warn!(
                entry = %member.name,
                limit = options.max_extracted_size,
                total,
                "extraction ceiling exceeded"
            );
            return Err(Error::ExtractedSizeExceeded {
                limit: options.max_extracted_size,
                total,
            });
        }

        if !tree.claim(&sanitized.relative) {
            return Err(Error::PathConflict {
                entry: member.name.clone(),
            });
        }
        write_member(&sanitized.resolved, &member.content)?;
        tracing::debug!(entry = %member.name, path = %sanitized.relative.display(), size, "staged");

        report.total_bytes = total;
        report.entries.push(ExtractedEntry {
            original_name: member.name.clone(),
            relative_path: sanitized.relative,
            size,
        });
    }

    report.entry_count = report.entries.len();
    tracing::info!(
        staging = %workspace.path().display(),
        entries = report.entry_count,
        bytes = report.total_bytes,
        skipped = report.skipped.len(),
        "archive staged"
    );

    Ok(WorkspaceExtraction { workspace, report })
}

/// Relative paths staged so far, split into files and the directories above them.
#[derive(Default)]
struct StagedTree {
    files: HashSet<PathBuf>,
    dirs: HashSet<PathBuf>,
}

impl StagedTree {
    /// Record `relative` as a file. Returns false if it, or one of its
    /// parents, is already taken by the other kind.
    fn claim(&mut self, relative: &Path) -> bool {
        let parents = relative
            .ancestors()
            .skip(1)
            .filter(|a| !a.as_os_str().is_empty());
        if self.dirs.contains(relative) || parents.clone().any(|a| self.files.contains(a)) {
            return false;
        }
        for parent in parents {
            self.dirs.insert(parent.to_path_buf());
        }
        self.files.insert(relative.to_path_buf());
        true
    }
}

fn write_member(target: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::DirectoryCreationFailed {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let mut file = File::create(target).map_err(|e| Error::ExtractionFailed {
        path: target.to_path_buf(),
        source: e,
    })?;
    file.write_all(content).map_err(|e| Error::ExtractionFailed {
        path: target.to_path_buf(),
        source: e,
    })
}
