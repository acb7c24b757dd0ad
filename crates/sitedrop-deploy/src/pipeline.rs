//! The upload pipeline.
//!
//! Stages run strictly in order and each one gates the next:
//!
//! 1. admission (rate limit)
//! 2. request pre-checks (file kind, declared upload size)
//! 3. decode the ZIP under the extraction ceiling
//! 4. structural validation, then content scanning
//! 5. staged extraction
//! 6. atomic publish
//! 7. deployment record
//!
//! Stages 1-4 touch nothing on disk except the rate counter.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use sitedrop_archive::{
    ArchiveMember, ExtractOptions, MIB, extract_to_workspace, read_members_from_bytes,
    sanitize_file_name, scan_members, validate_members,
};
use sitedrop_fs::{DirOps, StdDirOps};
use sitedrop_rate::{ActionKind, FileCounterStore, RateLimiter};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{LimitKind, PipelineError, Result};
use crate::lock::SubjectLocks;
use crate::publish::AtomicPublisher;
use crate::record::{DeploymentRecord, DeploymentSink, DeploymentStatus, NullSink};
use crate::target::{DeploymentTarget, Layout, check_id};

pub const DEFAULT_SITE_NAME: &str = "default";

const EMPTY_ARCHIVE: &str = "archive is empty";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadRequest {
    pub archive: Vec<u8>,
    pub file_name: String,
    pub site_name: Option<String>,
    pub preview: bool,
    pub subject_id: String,
    /// Subject's upload ceiling in MiB; falls back to `limits.default_upload_mb`.
    pub max_upload_mb: Option<u64>,
    /// Subject's daily upload allowance; falls back to `limits.daily_upload_limit`.
    pub daily_limit: Option<u32>,
}

impl UploadRequest {
    pub fn new(
        subject_id: impl Into<String>,
        file_name: impl Into<String>,
        archive: Vec<u8>,
    ) -> Self {
        Self {
            archive,
            file_name: file_name.into(),
            site_name: None,
            preview: false,
            subject_id: subject_id.into(),
            max_upload_mb: None,
            daily_limit: None,
        }
    }

    pub fn site_name(mut self, name: impl Into<String>) -> Self {
        self.site_name = Some(name.into());
        self
    }

    pub fn preview(mut self, preview: bool) -> Self {
        self.preview = preview;
        self
    }

    pub fn max_upload_mb(mut self, mb: u64) -> Self {
        self.max_upload_mb = Some(mb);
        self
    }

    pub fn daily_limit(mut self, limit: u32) -> Self {
        self.daily_limit = Some(limit);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UploadResponse {
    pub deployment_id: Uuid,
    pub preview_id: Option<String>,
    pub resulting_path: String,
    pub file_count: usize,
    pub total_size: u64,
    pub warnings: Vec<String>,
}

pub struct Pipeline<O: DirOps = StdDirOps> {
    pub(crate) config: Config,
    pub(crate) layout: Layout,
    pub(crate) limiter: RateLimiter,
    pub(crate) publisher: AtomicPublisher<O>,
    pub(crate) sink: Arc<dyn DeploymentSink>,
}

impl Pipeline<StdDirOps> {
    /// Pipeline over `config.publish_root` with file-backed rate counters and no record sink.
    pub fn new(config: Config) -> Self {
        let layout = Layout::new(&config.publish_root);
        let limiter = RateLimiter::new(Arc::new(FileCounterStore::new(layout.rate_limits())));
        let publisher = AtomicPublisher::new(Arc::new(SubjectLocks::new(layout.locks_dir())));
        Self {
            config,
            layout,
            limiter,
            publisher,
            sink: Arc::new(NullSink),
        }
    }
}

impl<O: DirOps> Pipeline<O> {
    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DeploymentSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Swap in different directory operations, keeping the lock registry.
    pub fn with_dir_ops<P: DirOps>(self, ops: P) -> Pipeline<P> {
        let locks = self.publisher.locks().clone();
        Pipeline {
            config: self.config,
            layout: self.layout,
            limiter: self.limiter,
            publisher: AtomicPublisher::with_ops(ops, locks),
            sink: self.sink,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn upload(&self, request: UploadRequest) -> Result<UploadResponse> {
        check_id("subject id", &request.subject_id)?;
        let subject = request.subject_id.as_str();

        let limit = request
            .daily_limit
            .unwrap_or(self.config.limits.daily_upload_limit);
        self.admit(subject, ActionKind::Upload, limit, "upload")?;

        self.pre_check(&request)?;

        let options = self.config.extract_options();
        let members = read_members_from_bytes(&request.archive, options.max_extracted_size)?;
        let (members, warnings) = self.validate(members, &options)?;

        let request_id = Uuid::new_v4().simple().to_string();
        let target = if request.preview {
            let preview_id = Uuid::new_v4().simple().to_string();
            DeploymentTarget::preview(&self.layout, subject, &preview_id)
        } else {
            DeploymentTarget::production(&self.layout, subject)
        };

        let staging = self.layout.staging(&request_id);
        let extraction = extract_to_workspace(&members, &staging, &options).map_err(|e| {
            tracing::warn!(subject, request = %request_id, error = %e, "extraction failed");
            PipelineError::from(e)
        })?;
        if extraction.report().entry_count == 0 {
            tracing::warn!(subject, request = %request_id, "nothing left to publish");
            extraction.abort();
            return Err(PipelineError::Validation {
                errors: vec![EMPTY_ARCHIVE.to_owned()],
            });
        }
        let published = self.publisher.publish(extraction, &target)?;

        let (file_count, total_size) = tally(&members, &published.report.skipped);
        let mut warnings = warnings;
        warnings.extend(
            published
                .report
                .skipped
                .iter()
                .map(|name| format!("Skipped unsafe path: {name}")),
        );

        let site_name = request
            .site_name
            .as_deref()
            .map(sanitize_file_name)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_SITE_NAME.to_owned());
        let record = DeploymentRecord {
            id: Uuid::new_v4(),
            subject_id: subject.to_owned(),
            site_name,
            is_preview: target.is_preview(),
            preview_id: target.preview_id.clone(),
            file_count,
            size_bytes: total_size,
            status: DeploymentStatus::Success,
            created_at: Utc::now(),
        };
        self.emit(&record);

        tracing::info!(
            subject,
            deployment = %record.id,
            path = %target.url_path(),
            files = file_count,
            bytes = total_size,
            "upload deployed"
        );

        Ok(UploadResponse {
            deployment_id: record.id,
            preview_id: target.preview_id.clone(),
            resulting_path: target.url_path(),
            file_count,
            total_size,
            warnings,
        })
    }

    pub(crate) fn admit(
        &self,
        subject: &str,
        action: ActionKind,
        limit: u32,
        what: &str,
    ) -> Result<()> {
        let decision = self.limiter.check(subject, action, limit)?;
        if decision.allowed {
            return Ok(());
        }
        Err(PipelineError::ResourceLimit {
            kind: LimitKind::DailyRate,
            message: format!("Daily {what} limit reached. Please try again tomorrow."),
        })
    }

    fn pre_check(&self, request: &UploadRequest) -> Result<()> {
        if request.archive.is_empty() {
            return Err(PipelineError::input("No file uploaded"));
        }
        if !request.file_name.to_ascii_lowercase().ends_with(".zip") {
            return Err(PipelineError::input("Only ZIP files are allowed"));
        }
        let max_mb = request
            .max_upload_mb
            .unwrap_or(self.config.limits.default_upload_mb);
        if request.archive.len() as u64 > max_mb.saturating_mul(MIB) {
            return Err(PipelineError::input(format!(
                "File size exceeds {max_mb}MB limit"
            )));
        }
        Ok(())
    }

    /// Structural validation then content scan. Returns the members to extract.
    fn validate(
        &self,
        members: Vec<ArchiveMember>,
        options: &ExtractOptions,
    ) -> Result<(Vec<ArchiveMember>, Vec<String>)> {
        let validation = validate_members(&members, options);
        if !validation.valid {
            tracing::warn!(errors = ?validation.errors, "archive failed validation");
            return Err(PipelineError::Validation {
                errors: validation.errors,
            });
        }

        if validation.total_size > options.max_extracted_size {
            return Err(PipelineError::ResourceLimit {
                kind: LimitKind::ExtractedSize,
                message: format!(
                    "Total extracted size ({}MB) exceeds maximum limit of {}MB",
                    validation.total_size.div_ceil(MIB),
                    options.max_extracted_size / MIB
                ),
            });
        }

        let members: Vec<ArchiveMember> = members
            .into_iter()
            .filter(|m| !validation.skipped.contains(&m.name))
            .collect();
        if !members.iter().any(ArchiveMember::is_eligible) {
            return Err(PipelineError::Validation {
                errors: vec![EMPTY_ARCHIVE.to_owned()],
            });
        }

        let findings = scan_members(&members);
        if !findings.is_empty() {
            tracing::warn!(count = findings.len(), "archive content rejected");
            return Err(PipelineError::Validation {
                errors: findings.iter().map(ToString::to_string).collect(),
            });
        }

        Ok((members, validation.warnings))
    }

    pub(crate) fn emit(&self, record: &DeploymentRecord) {
        if let Err(e) = self.sink.record(record) {
            tracing::warn!(deployment = %record.id, error = %e, "failed to store deployment record");
        }
    }
}

/// File count and declared bytes of what was actually published.
fn tally(members: &[ArchiveMember], skipped: &[String]) -> (usize, u64) {
    members
        .iter()
        .filter(|m| m.is_eligible() && !skipped.contains(&m.name))
        .fold((0, 0), |(count, bytes), m| (count + 1, bytes + m.declared_size))
}

impl<O: DirOps> std::fmt::Debug for Pipeline<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}
