use std::path::Path;
use std::sync::Arc;

use sitedrop_archive::{ArchiveReport, WorkspaceExtraction};
use sitedrop_fs::{DirOps, StdDirOps, Swapped, Workspace};

use crate::error::{PipelineError, Result};
use crate::lock::{SubjectGuard, SubjectLocks};
use crate::target::{DeploymentTarget, TargetKind};

/// Result of a completed publish.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Published {
    pub report: ArchiveReport,
    pub swapped: Swapped,
}

/// Swaps staged trees into their targets.
///
/// Production targets are swapped under the subject's publish lock; preview
/// targets have fresh ids and need no lock.
#[derive(Debug)]
pub struct AtomicPublisher<O: DirOps = StdDirOps> {
    ops: O,
    locks: Arc<SubjectLocks>,
}

impl AtomicPublisher<StdDirOps> {
    pub fn new(locks: Arc<SubjectLocks>) -> Self {
        Self::with_ops(StdDirOps, locks)
    }
}

impl<O: DirOps> AtomicPublisher<O> {
    pub fn with_ops(ops: O, locks: Arc<SubjectLocks>) -> Self {
        Self { ops, locks }
    }

    pub fn locks(&self) -> &Arc<SubjectLocks> {
        &self.locks
    }

    /// Commit an extraction to `target`.
    ///
    /// On failure the target is left as it was, except for
    /// [`PipelineError::FatalInconsistency`]. The staging tree is removed either way.
    pub fn publish(
        &self,
        extraction: WorkspaceExtraction,
        target: &DeploymentTarget,
    ) -> Result<Published> {
        let _guard = match target.kind {
            TargetKind::Production => Some(self.locks.acquire(&target.subject_id)?),
            TargetKind::Preview => None,
        };

        let staging = extraction.path().to_path_buf();
        let (report, swapped) = extraction
            .commit_with(&self.ops, &target.root_path)
            .map_err(|e| log_failure(PipelineError::from(e), &target.root_path))?;

        tracing::info!(
            target = %target.root_path.display(),
            staging = %staging.display(),
            kind = ?target.kind,
            replaced = swapped.backup.is_some(),
            "published"
        );
        Ok(Published { report, swapped })
    }

    /// Swap an already populated workspace into a production target.
    ///
    /// The caller holds the subject's publish slot for as long as the
    /// workspace contents depend on shared state.
    pub fn publish_workspace(
        &self,
        workspace: Workspace,
        target: &DeploymentTarget,
        held: &SubjectGuard<'_>,
    ) -> Result<Swapped> {
        debug_assert_eq!(held.subject_id(), target.subject_id);
        let swapped = workspace
            .commit_with(&self.ops, &target.root_path)
            .map_err(|e| log_failure(PipelineError::from_publish(e), &target.root_path))?;
        tracing::info!(target = %target.root_path.display(), "published workspace");
        Ok(swapped)
    }
}

fn log_failure(err: PipelineError, target: &Path) -> PipelineError {
    if let PipelineError::FatalInconsistency { backup, .. } = &err {
        tracing::error!(
            fatal = true,
            target = %target.display(),
            backup = %backup.display(),
            error = %err,
            "publish rollback failed; operator intervention required"
        );
    } else {
        tracing::warn!(target = %target.display(), error = %err, "publish failed");
    }
    err
}
