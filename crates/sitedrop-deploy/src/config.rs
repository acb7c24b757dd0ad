//! Layered configuration: defaults, then `sitedrop.toml`, then `SITEDROP_*` env vars.
//!
//! Nested keys use a double underscore in the environment, e.g.
//! `SITEDROP_LIMITS__DAILY_UPLOAD_LIMIT=20`.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use sitedrop_archive::{
    DEFAULT_MAX_EXTRACTED_SIZE, DEFAULT_MAX_FILE_SIZE, ExtractOptions, Strictness,
};

pub const DEFAULT_CONFIG_FILE: &str = "sitedrop.toml";
pub const ENV_PREFIX: &str = "SITEDROP_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Figment(#[from] Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_file_size: u64,
    pub max_extracted_size: u64,
    /// Per-subject upload ceiling in MiB when the request does not carry one.
    pub default_upload_mb: u64,
    pub daily_upload_limit: u32,
    pub daily_deploy_limit: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_extracted_size: DEFAULT_MAX_EXTRACTED_SIZE,
            default_upload_mb: 100,
            daily_upload_limit: 10,
            daily_deploy_limit: 10,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub publish_root: PathBuf,
    pub limits: Limits,
    pub strictness: Strictness,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            publish_root: PathBuf::from("public"),
            limits: Limits::default(),
            strictness: Strictness::default(),
        }
    }
}

impl Config {
    pub fn figment(file: Option<&Path>) -> Figment {
        let file = file.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and check the layered configuration. A missing file is not an error.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let config: Config = Self::figment(file).extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_file_size == 0 {
            return Err(ConfigError::Invalid("limits.max_file_size must be positive".into()));
        }
        if self.limits.max_extracted_size <= self.limits.max_file_size {
            return Err(ConfigError::Invalid(
                "limits.max_extracted_size must be above limits.max_file_size".into(),
            ));
        }
        if self.publish_root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("publish_root must be set".into()));
        }
        Ok(())
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions::default()
            .max_file_size(self.limits.max_file_size)
            .max_extracted_size(self.limits.max_extracted_size)
            .strictness(self.strictness)
    }
}
