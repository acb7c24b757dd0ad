use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Success,
    Promoted,
}

/// What a completed publish hands to the metadata collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub id: Uuid,
    pub subject_id: String,
    pub site_name: String,
    pub is_preview: bool,
    pub preview_id: Option<String>,
    pub file_count: usize,
    pub size_bytes: u64,
    pub status: DeploymentStatus,
    pub created_at: DateTime<Utc>,
}

pub trait DeploymentSink: Send + Sync {
    fn record(&self, record: &DeploymentRecord) -> io::Result<()>;
}

/// Discards records.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl DeploymentSink for NullSink {
    fn record(&self, _record: &DeploymentRecord) -> io::Result<()> {
        Ok(())
    }
}

/// Appends one JSON object per line.
#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
    write: Mutex<()>,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every record written so far, oldest first.
    pub fn read_all(&self) -> io::Result<Vec<DeploymentRecord>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(io::Error::other))
            .collect()
    }
}

impl DeploymentSink for JsonlSink {
    fn record(&self, record: &DeploymentRecord) -> io::Result<()> {
        let mut line = serde_json::to_vec(record).map_err(io::Error::other)?;
        line.push(b'\n');

        let _serial = self
            .write
            .lock()
            .map_err(|_| io::Error::other("sink lock poisoned"))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)
    }
}
