//! Publishes uploaded ZIP archives as static site trees.
//!
//! # Architecture
//!
//! - `config.rs` - Layered configuration (defaults, TOML file, environment)
//! - `target.rs` - Publish-root layout and deployment targets
//! - `lock.rs` - Per-subject publish exclusion
//! - `publish.rs` - Atomic swap of staged trees into targets
//! - `pipeline.rs` - Upload request handling, stage by stage
//! - `promote.rs` - Preview promotion
//! - `record.rs` - Deployment records and sinks
//! - `error.rs` - Error taxonomy with HTTP-equivalent status codes

pub use config::{Config, ConfigError, Limits};
pub use error::{LimitKind, PipelineError, Result};
pub use lock::{SubjectGuard, SubjectLocks};
pub use pipeline::{DEFAULT_SITE_NAME, Pipeline, UploadRequest, UploadResponse};
pub use promote::PromoteResponse;
pub use publish::{AtomicPublisher, Published};
pub use record::{DeploymentRecord, DeploymentSink, DeploymentStatus, JsonlSink, NullSink};
pub use target::{DeploymentTarget, Layout, TargetKind, check_id};

pub mod config;
mod error;
mod lock;
mod pipeline;
mod promote;
mod publish;
mod record;
mod target;
