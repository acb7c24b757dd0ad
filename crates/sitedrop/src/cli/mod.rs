use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use sitedrop_deploy::PipelineError;

pub mod check;
pub mod promote;
pub mod upload;
pub mod usage;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub fatal: bool,
    pub errors: Vec<String>,
}

impl From<&PipelineError> for ErrorBody {
    fn from(err: &PipelineError) -> Self {
        Self {
            status: err.status_code(),
            fatal: err.is_fatal(),
            errors: err.details(),
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("failed to encode output")?;
    println!("{out}");
    Ok(())
}

pub fn read_archive(path: &Path) -> Result<(String, Vec<u8>)> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok((name, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_listed_individually() {
        let err = PipelineError::Validation {
            errors: vec!["a".into(), "b".into()],
        };
        let body = ErrorBody::from(&err);
        assert_eq!(body.status, 400);
        assert!(!body.fatal);
        assert_eq!(body.errors, vec!["a", "b"]);
    }

    #[test]
    fn archive_name_comes_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.zip");
        std::fs::write(&path, b"PK").unwrap();
        let (name, data) = read_archive(&path).unwrap();
        assert_eq!(name, "site.zip");
        assert_eq!(data, b"PK");
    }
}
