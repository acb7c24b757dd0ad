use std::io;
use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use sitedrop_fs::{DirOps, Workspace, copy_dir_all};
use sitedrop_rate::ActionKind;
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::pipeline::{DEFAULT_SITE_NAME, Pipeline};
use crate::record::{DeploymentRecord, DeploymentStatus};
use crate::target::{DeploymentTarget, check_id};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PromoteResponse {
    pub deployment_id: Uuid,
    pub live_path: String,
    pub file_count: usize,
    pub size_bytes: u64,
}

impl<O: DirOps> Pipeline<O> {
    /// Make a committed preview the subject's live site.
    ///
    /// The preview is copied next to the site directory and swapped in with the
    /// same backup and rollback as an upload. The preview is removed afterwards.
    pub fn promote_preview(&self, subject_id: &str, preview_id: &str) -> Result<PromoteResponse> {
        check_id("subject id", subject_id)?;
        check_id("preview id", preview_id)?;

        let preview = self.layout.preview(preview_id);
        if !preview.is_dir() {
            return Err(PipelineError::input(format!(
                "Preview not found: {preview_id}"
            )));
        }

        self.admit(
            subject_id,
            ActionKind::Deploy,
            self.config.limits.daily_deploy_limit,
            "deploy",
        )?;

        let guard = self.publisher.locks().acquire(subject_id)?;
        // A concurrent promotion may have consumed the preview while we waited.
        if !preview.is_dir() {
            return Err(PipelineError::input(format!(
                "Preview not found: {preview_id}"
            )));
        }

        let temp = self
            .layout
            .sites_dir()
            .join(format!("{subject_id}.tmp.{}", Uuid::new_v4().simple()));
        let workspace = Workspace::new(&temp).map_err(PipelineError::from_publish)?;
        copy_dir_all(&preview, workspace.path()).map_err(PipelineError::from_publish)?;
        let (file_count, size_bytes) = tree_stats(workspace.path()).map_err(|e| {
            PipelineError::from_publish(sitedrop_fs::Error::Read {
                path: temp.clone(),
                source: e,
            })
        })?;

        let target = DeploymentTarget::production(&self.layout, subject_id);
        self.publisher.publish_workspace(workspace, &target, &guard)?;

        if let Err(e) = std::fs::remove_dir_all(&preview) {
            tracing::warn!(preview = %preview.display(), error = %e, "failed to remove promoted preview");
        }
        drop(guard);

        let record = DeploymentRecord {
            id: Uuid::new_v4(),
            subject_id: subject_id.to_owned(),
            site_name: DEFAULT_SITE_NAME.to_owned(),
            is_preview: false,
            preview_id: Some(preview_id.to_owned()),
            file_count,
            size_bytes,
            status: DeploymentStatus::Promoted,
            created_at: Utc::now(),
        };
        self.emit(&record);
        tracing::info!(subject = subject_id, preview = preview_id, "preview promoted");

        Ok(PromoteResponse {
            deployment_id: record.id,
            live_path: target.url_path(),
            file_count,
            size_bytes,
        })
    }
}

/// Regular files and their total size under `dir`.
fn tree_stats(dir: &Path) -> io::Result<(usize, u64)> {
    let mut files = 0;
    let mut bytes = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            let (f, b) = tree_stats(&entry.path())?;
            files += f;
            bytes += b;
        } else if file_type.is_file() {
            files += 1;
            bytes += entry.metadata()?.len();
        }
    }
    Ok((files, bytes))
}
