use std::process::ExitCode;

use anyhow::Result;
use sitedrop_deploy::Pipeline;

use super::print_json;

#[derive(Debug, clap::Args)]
pub struct Promote {
    pub preview_id: String,

    #[arg(long)]
    pub subject: String,
}

impl Promote {
    pub fn run(self, pipeline: &Pipeline) -> Result<ExitCode> {
        let response = pipeline.promote_preview(&self.subject, &self.preview_id)?;
        print_json(&response)?;
        Ok(ExitCode::SUCCESS)
    }
}
