//! Static build target configuration.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::{ReleaseError, ReleaseResult};

fn default_build_command() -> Vec<String> {
    ["cargo", "build", "--release", "--locked", "--target", "{triple}"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_timeout_secs() -> u64 {
    3600
}

/// One platform/toolchain combination a binary is built for.
///
/// Command templates may use `{triple}`, `{binary}`, `{binary_path}`,
/// `{bin_dir}` and `{archive}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildTarget {
    /// Unique platform identifier (e.g. `linux-x86_64`).
    pub platform_id: String,

    /// Toolchain target triple.
    pub toolchain_triple: String,

    /// Name of the binary the toolchain produces.
    pub binary_name: String,

    /// File name of the packed bundle. Unique across a target set.
    pub archive_name: String,

    /// Archive-packing command template (first element is executable).
    pub pack_command: Vec<String>,

    /// Toolchain command template.
    #[serde(default = "default_build_command")]
    pub build_command: Vec<String>,

    /// Per-command timeout in seconds (0 = no timeout).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl BuildTarget {
    /// Create a target with the default toolchain command and timeout.
    pub fn new(
        platform_id: impl Into<String>,
        toolchain_triple: impl Into<String>,
        binary_name: impl Into<String>,
        archive_name: impl Into<String>,
        pack_command: Vec<String>,
    ) -> Self {
        Self {
            platform_id: platform_id.into(),
            toolchain_triple: toolchain_triple.into(),
            binary_name: binary_name.into(),
            archive_name: archive_name.into(),
            pack_command,
            build_command: default_build_command(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Where the toolchain leaves the binary, relative to `workspace`.
    pub fn binary_path(&self, workspace: &Path) -> std::path::PathBuf {
        workspace
            .join("target")
            .join(&self.toolchain_triple)
            .join("release")
            .join(&self.binary_name)
    }

    /// Expanded toolchain command.
    pub fn build_argv(&self, workspace: &Path) -> Vec<String> {
        self.expand(&self.build_command, workspace)
    }

    /// Expanded pack command.
    pub fn pack_argv(&self, workspace: &Path) -> Vec<String> {
        self.expand(&self.pack_command, workspace)
    }

    fn expand(&self, template: &[String], workspace: &Path) -> Vec<String> {
        let binary_path = self.binary_path(workspace);
        let bin_dir = binary_path
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        let binary_path = binary_path.to_string_lossy().into_owned();

        template
            .iter()
            .map(|arg| {
                arg.replace("{triple}", &self.toolchain_triple)
                    .replace("{binary_path}", &binary_path)
                    .replace("{binary}", &self.binary_name)
                    .replace("{bin_dir}", &bin_dir)
                    .replace("{archive}", &self.archive_name)
            })
            .collect()
    }
}

/// Check a target set before any build starts.
///
/// Duplicate archive names are left to the aggregator, which
/// reports them as `DuplicateArtifact`.
pub fn validate_targets(targets: &[BuildTarget]) -> ReleaseResult<()> {
    if targets.is_empty() {
        return Err(ReleaseError::Config("no build targets configured".to_string()));
    }

    let mut seen = HashSet::new();
    for target in targets {
        if target.platform_id.is_empty() {
            return Err(ReleaseError::Config("target with empty platform_id".to_string()));
        }
        if !seen.insert(target.platform_id.as_str()) {
            return Err(ReleaseError::Config(format!(
                "duplicate platform_id {}",
                target.platform_id
            )));
        }
        if target.archive_name.is_empty() || target.archive_name.contains(['/', '\\']) {
            return Err(ReleaseError::Config(format!(
                "target {} has invalid archive_name '{}'",
                target.platform_id, target.archive_name
            )));
        }
        if target.build_command.is_empty() || target.pack_command.is_empty() {
            return Err(ReleaseError::Config(format!(
                "target {} has an empty command",
                target.platform_id
            )));
        }
    }
    Ok(())
}
