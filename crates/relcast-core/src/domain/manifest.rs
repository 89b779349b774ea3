//! Checksum manifest model and its text format.
//!
//! Format: one `<64 hex digest><two spaces><archive name>\n` line per
//! artifact, no header or footer, so `sha256sum -c` accepts it as is.

use relcast_state::ContentDigest;
use serde::{Deserialize, Serialize};

use super::error::{ReleaseError, ReleaseResult};

/// One `(archive name, digest)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumEntry {
    pub archive_name: String,
    pub digest: ContentDigest,
}

/// Ordered checksum listing covering every artifact of a release.
///
/// The manifest file never lists itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumManifest {
    entries: Vec<ChecksumEntry>,
}

impl ChecksumManifest {
    pub fn new(entries: Vec<ChecksumEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ChecksumEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn digest_of(&self, archive_name: &str) -> Option<&ContentDigest> {
        self.entries
            .iter()
            .find(|e| e.archive_name == archive_name)
            .map(|e| &e.digest)
    }

    /// Serialize to the checksum-file text format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(entry.digest.as_str());
            out.push_str("  ");
            out.push_str(&entry.archive_name);
            out.push('\n');
        }
        out
    }

    /// Parse the checksum-file text format.
    ///
    /// Accepts the binary-mode marker (`<digest> *<name>`) written by some
    /// tools; blank lines are ignored.
    pub fn parse(text: &str) -> ReleaseResult<Self> {
        let mut entries = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let (digest, name) = line
                .split_once("  ")
                .or_else(|| line.split_once(" *"))
                .ok_or_else(|| {
                    ReleaseError::Config(format!("manifest line {} is malformed: {line}", idx + 1))
                })?;
            let digest = ContentDigest::try_from(digest.to_string()).map_err(|e| {
                ReleaseError::Config(format!("manifest line {}: {e}", idx + 1))
            })?;
            if name.is_empty() {
                return Err(ReleaseError::Config(format!(
                    "manifest line {} has no file name",
                    idx + 1
                )));
            }
            entries.push(ChecksumEntry {
                archive_name: name.to_string(),
                digest,
            });
        }
        Ok(Self { entries })
    }
}
