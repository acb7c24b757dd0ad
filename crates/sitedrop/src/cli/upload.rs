use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use sitedrop_deploy::{Pipeline, UploadRequest};

use super::{print_json, read_archive};

#[derive(Debug, clap::Args)]
pub struct Upload {
    /// Archive to publish
    pub archive: PathBuf,

    /// Subject (account) the site belongs to
    #[arg(long)]
    pub subject: String,

    /// Display name of the site
    #[arg(long)]
    pub site: Option<String>,

    /// Publish under a fresh preview id instead of the live site
    #[arg(long)]
    pub preview: bool,

    /// Upload size ceiling in MiB for this subject
    #[arg(long)]
    pub max_upload_mb: Option<u64>,

    /// Daily upload allowance for this subject
    #[arg(long)]
    pub daily_limit: Option<u32>,
}

impl Upload {
    pub fn run(self, pipeline: &Pipeline) -> Result<ExitCode> {
        let (file_name, data) = read_archive(&self.archive)?;
        let mut request = UploadRequest::new(self.subject, file_name, data).preview(self.preview);
        if let Some(site) = self.site {
            request = request.site_name(site);
        }
        if let Some(mb) = self.max_upload_mb {
            request = request.max_upload_mb(mb);
        }
        if let Some(limit) = self.daily_limit {
            request = request.daily_limit(limit);
        }

        let response = pipeline.upload(request)?;
        print_json(&response)?;
        Ok(ExitCode::SUCCESS)
    }
}
