//! Pipeline configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::checksum::DEFAULT_MANIFEST_NAME;
use crate::domain::{ReleaseError, ReleaseResult};
use crate::retry::RetryPolicy;

/// Settings for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Source checkout the toolchain builds from
    pub workspace_dir: PathBuf,
    /// Root for per-target staging dirs and the aggregated `dist/` dir
    pub staging_dir: PathBuf,
    /// Upper bound on concurrently running build tasks
    pub max_parallel: usize,
    /// File name of the checksum manifest
    pub manifest_name: String,
    /// Git remote tags are pushed to
    pub remote: String,
    /// Upload retry policy
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            workspace_dir: PathBuf::from("."),
            staging_dir: PathBuf::from("target/relcast"),
            max_parallel: 4,
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
            remote: "origin".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by `RELCAST_*` environment variables.
    pub fn from_env() -> ReleaseResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> ReleaseResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(dir) = lookup("RELCAST_WORKSPACE") {
            config.workspace_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("RELCAST_STAGING_DIR") {
            config.staging_dir = PathBuf::from(dir);
        }
        if let Some(n) = lookup("RELCAST_MAX_PARALLEL") {
            config.max_parallel = parse_var("RELCAST_MAX_PARALLEL", &n)?;
        }
        if let Some(n) = lookup("RELCAST_UPLOAD_RETRIES") {
            config.retry.max_retries = parse_var("RELCAST_UPLOAD_RETRIES", &n)?;
        }
        if let Some(ms) = lookup("RELCAST_UPLOAD_BACKOFF_MS") {
            config.retry.backoff_base_ms = parse_var("RELCAST_UPLOAD_BACKOFF_MS", &ms)?;
        }
        if let Some(name) = lookup("RELCAST_MANIFEST_NAME") {
            config.manifest_name = name;
        }
        if let Some(remote) = lookup("RELCAST_REMOTE") {
            config.remote = remote;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_workspace(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workspace_dir = dir.into();
        self
    }

    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }

    /// Where per-target build outputs are staged.
    pub fn build_root(&self) -> PathBuf {
        self.staging_dir.join("build")
    }

    /// Where the aggregated artifacts and manifest are written.
    pub fn dist_dir(&self) -> PathBuf {
        self.staging_dir.join("dist")
    }

    pub fn validate(&self) -> ReleaseResult<()> {
        if self.max_parallel == 0 {
            return Err(ReleaseError::Config(
                "max_parallel must be at least 1".to_string(),
            ));
        }
        if self.manifest_name.is_empty() || self.manifest_name.contains(['/', '\\']) {
            return Err(ReleaseError::Config(format!(
                "invalid manifest name '{}'",
                self.manifest_name
            )));
        }
        if self.remote.trim().is_empty() {
            return Err(ReleaseError::Config("remote must not be empty".to_string()));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> ReleaseResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| ReleaseError::Config(format!("{key}: cannot parse '{raw}'")))
}
