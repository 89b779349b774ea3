//! Packed artifacts and the aggregated set handed to publishing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{ReleaseError, ReleaseResult};

/// A packed, distributable bundle produced for one target.
///
/// The bytes live in the file at `archive_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub platform_id: String,
    pub archive_name: String,
    pub archive_path: PathBuf,
    pub size_bytes: u64,
}

impl Artifact {
    /// Describe the bundle at `archive_path`, checking it exists and is non-empty.
    pub fn from_path(platform_id: &str, archive_path: &Path) -> ReleaseResult<Self> {
        let metadata = std::fs::metadata(archive_path).map_err(|e| {
            ReleaseError::Io(std::io::Error::new(
                e.kind(),
                format!("archive {} not found: {e}", archive_path.display()),
            ))
        })?;
        if !metadata.is_file() || metadata.len() == 0 {
            return Err(ReleaseError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("archive {} is empty or not a file", archive_path.display()),
            )));
        }
        let archive_name = archive_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                ReleaseError::Config(format!("archive path {} has no file name", archive_path.display()))
            })?;

        Ok(Self {
            platform_id: platform_id.to_string(),
            archive_name,
            archive_path: archive_path.to_path_buf(),
            size_bytes: metadata.len(),
        })
    }
}

/// All artifacts of one release keyed by archive name.
///
/// Iteration is lexicographic by archive name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedArtifactSet {
    artifacts: BTreeMap<String, Artifact>,
}

impl AggregatedArtifactSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an artifact. Fails if its archive name is already present.
    pub fn insert(&mut self, artifact: Artifact) -> ReleaseResult<()> {
        if let Some(existing) = self.artifacts.get(&artifact.archive_name) {
            return Err(ReleaseError::DuplicateArtifact {
                archive_name: artifact.archive_name.clone(),
                first_platform: existing.platform_id.clone(),
                second_platform: artifact.platform_id.clone(),
            });
        }
        self.artifacts.insert(artifact.archive_name.clone(), artifact);
        Ok(())
    }

    /// Every regular file in `dir` except those named in `exclude`.
    ///
    /// The file name doubles as platform id; used when checksumming an
    /// existing directory outside a pipeline run.
    pub fn from_dir(dir: &Path, exclude: &[&str]) -> ReleaseResult<Self> {
        let mut set = Self::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if exclude.contains(&name.as_str()) {
                continue;
            }
            set.insert(Artifact::from_path(&name, &entry.path())?)?;
        }
        Ok(set)
    }

    pub fn get(&self, archive_name: &str) -> Option<&Artifact> {
        self.artifacts.get(archive_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.values()
    }

    pub fn names(&self) -> Vec<&str> {
        self.artifacts.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.artifacts.values().map(|a| a.size_bytes).sum()
    }
}
