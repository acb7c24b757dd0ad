use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{PipelineError, Result};

/// Directory layout under the publish root.
///
/// ```text
/// <root>/staging/<request-id>/          extraction target, never served
/// <root>/preview/<preview-id>/          committed previews
/// <root>/sites/<subject>/               live site
/// <root>/sites/<subject>.backup.<ms>/   transient during a swap
/// <root>/locks/<subject>.lock           publish lock
/// <root>/rate-limits.json               counters
/// <root>/deployments.jsonl              deployment records
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.root.join("staging")
    }

    pub fn staging(&self, request_id: &str) -> PathBuf {
        self.staging_dir().join(request_id)
    }

    pub fn preview_dir(&self) -> PathBuf {
        self.root.join("preview")
    }

    pub fn preview(&self, preview_id: &str) -> PathBuf {
        self.preview_dir().join(preview_id)
    }

    pub fn sites_dir(&self) -> PathBuf {
        self.root.join("sites")
    }

    pub fn site(&self, subject_id: &str) -> PathBuf {
        self.sites_dir().join(subject_id)
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.root.join("locks")
    }

    pub fn rate_limits(&self) -> PathBuf {
        self.root.join("rate-limits.json")
    }

    pub fn deployments_log(&self) -> PathBuf {
        self.root.join("deployments.jsonl")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Preview,
    Production,
}

/// Where a staged tree lands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeploymentTarget {
    pub kind: TargetKind,
    /// The directory that gets swapped.
    pub root_path: PathBuf,
    pub subject_id: String,
    pub preview_id: Option<String>,
}

impl DeploymentTarget {
    pub fn production(layout: &Layout, subject_id: &str) -> Self {
        Self {
            kind: TargetKind::Production,
            root_path: layout.site(subject_id),
            subject_id: subject_id.to_owned(),
            preview_id: None,
        }
    }

    pub fn preview(layout: &Layout, subject_id: &str, preview_id: &str) -> Self {
        Self {
            kind: TargetKind::Preview,
            root_path: layout.preview(preview_id),
            subject_id: subject_id.to_owned(),
            preview_id: Some(preview_id.to_owned()),
        }
    }

    pub fn is_preview(&self) -> bool {
        self.kind == TargetKind::Preview
    }

    /// URL fragment the tree is served under.
    pub fn url_path(&self) -> String {
        match &self.preview_id {
            Some(id) if self.is_preview() => format!("/preview/{id}"),
            _ => format!("/{}", self.subject_id),
        }
    }
}

/// Subject and preview ids become directory names, so only a plain charset is allowed.
pub fn check_id(what: &str, id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id.len() <= 64
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !id.contains("..")
        && !id.contains(".backup.")
        && !id.contains(".tmp.");
    if valid {
        Ok(())
    } else {
        Err(PipelineError::input(format!("invalid {what}: {id:?}")))
    }
}
