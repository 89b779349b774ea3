//! Build target definitions and configuration.

use std::path::Path;

use relcast_core::{validate_targets, BuildTarget, ReleaseError, ReleaseResult};
use serde::{Deserialize, Serialize};

/// Platforms relcast builds for out of the box.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum BuiltinTarget {
    LinuxX86_64,
    LinuxAarch64,
    MacosX86_64,
    MacosAarch64,
}

impl BuiltinTarget {
    pub const ALL: [BuiltinTarget; 4] = [
        BuiltinTarget::LinuxX86_64,
        BuiltinTarget::LinuxAarch64,
        BuiltinTarget::MacosX86_64,
        BuiltinTarget::MacosAarch64,
    ];

    /// Get the platform id as a string.
    pub fn platform_id(&self) -> &'static str {
        match self {
            BuiltinTarget::LinuxX86_64 => "linux-x86_64",
            BuiltinTarget::LinuxAarch64 => "linux-aarch64",
            BuiltinTarget::MacosX86_64 => "macos-x86_64",
            BuiltinTarget::MacosAarch64 => "macos-aarch64",
        }
    }

    pub fn triple(&self) -> &'static str {
        match self {
            BuiltinTarget::LinuxX86_64 => "x86_64-unknown-linux-gnu",
            BuiltinTarget::LinuxAarch64 => "aarch64-unknown-linux-gnu",
            BuiltinTarget::MacosX86_64 => "x86_64-apple-darwin",
            BuiltinTarget::MacosAarch64 => "aarch64-apple-darwin",
        }
    }

    /// Full target entry for `binary`, archived as `<binary>-<triple>.tar.gz`.
    pub fn to_target(&self, binary: &str) -> BuildTarget {
        BuildTarget::new(
            self.platform_id(),
            self.triple(),
            binary,
            format!("{binary}-{}.tar.gz", self.triple()),
            default_pack_command(),
        )
    }
}

/// `tar -czf {archive} -C {bin_dir} {binary}`, run inside the staging dir.
pub fn default_pack_command() -> Vec<String> {
    ["tar", "-czf", "{archive}", "-C", "{bin_dir}", "{binary}"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Every builtin platform for `binary`.
pub fn default_targets(binary: &str) -> Vec<BuildTarget> {
    BuiltinTarget::ALL
        .iter()
        .map(|t| t.to_target(binary))
        .collect()
}

/// Load a JSON array of `BuildTarget` objects and validate it.
pub fn load_targets(path: &Path) -> ReleaseResult<Vec<BuildTarget>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        ReleaseError::Config(format!("cannot read targets file {}: {e}", path.display()))
    })?;
    let targets: Vec<BuildTarget> = serde_json::from_str(&raw)?;
    validate_targets(&targets)?;
    Ok(targets)
}
