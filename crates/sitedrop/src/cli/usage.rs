use std::process::ExitCode;

use anyhow::Result;
use sitedrop_deploy::{Pipeline, PipelineError};

use super::print_json;

#[derive(Debug, clap::Args)]
pub struct Usage {
    #[arg(long)]
    pub subject: String,
}

impl Usage {
    pub fn run(self, pipeline: &Pipeline) -> Result<ExitCode> {
        let counters = pipeline
            .limiter()
            .usage(&self.subject)
            .map_err(PipelineError::from)?;
        print_json(&counters)?;
        Ok(ExitCode::SUCCESS)
    }
}
