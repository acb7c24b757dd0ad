use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use serde::Serialize;
use sitedrop_archive::{
    ArchiveMember, ValidationResult, is_allowed_file_type, read_members_from_bytes,
    sanitize_member, scan_members, validate_members,
};
use sitedrop_deploy::{Config, Layout, PipelineError};

use super::{print_json, read_archive};

#[derive(Debug, clap::Args)]
pub struct Check {
    pub archive: PathBuf,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    #[serde(flatten)]
    validation: ValidationResult,
    findings: Vec<String>,
    /// Members outside the static-asset allowlist.
    unrecognized: Vec<String>,
}

/// Path and content rejections, in archive order per stage.
fn findings(members: &[ArchiveMember], staging: &Path) -> Vec<String> {
    let unsafe_paths = members
        .iter()
        .filter(|m| m.is_eligible())
        .filter_map(|m| sanitize_member(m, staging).err());
    unsafe_paths
        .chain(scan_members(members))
        .map(|e| e.to_string())
        .collect()
}

impl Check {
    pub fn run(self, config: &Config) -> Result<ExitCode> {
        let (_, data) = read_archive(&self.archive)?;
        let options = config.extract_options();
        let members = read_members_from_bytes(&data, options.max_extracted_size)
            .map_err(PipelineError::from)?;

        let validation = validate_members(&members, &options);
        let staging = Layout::new(&config.publish_root).staging("check");
        let findings = findings(&members, &staging);
        let unrecognized = members
            .iter()
            .filter(|m| m.is_eligible() && !is_allowed_file_type(&m.name))
            .map(|m| m.name.clone())
            .collect();

        let clean = validation.valid && findings.is_empty();
        print_json(&CheckReport {
            validation,
            findings,
            unrecognized,
        })?;
        Ok(if clean {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        })
    }
}
