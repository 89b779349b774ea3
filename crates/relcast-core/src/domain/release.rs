//! The terminal published entity.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedFile {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// A published release: every platform artifact plus the checksum manifest.
///
/// Created exactly once per successful run and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub tag_name: String,
    pub display_name: String,
    pub is_prerelease: bool,
    pub is_draft: bool,
    /// Artifacts in archive-name order, manifest last.
    pub attached_files: Vec<AttachedFile>,
    /// Identifier assigned by the hosting service.
    pub host_id: u64,
    pub html_url: Option<String>,
}

impl Release {
    pub fn attached_names(&self) -> Vec<&str> {
        self.attached_files.iter().map(|f| f.name.as_str()).collect()
    }
}
