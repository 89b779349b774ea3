//! Checksum generation and verification over an aggregated artifact set.

use std::path::{Path, PathBuf};

use relcast_state::ContentDigest;
use serde::Serialize;
use tracing::instrument;

use crate::domain::{
    AggregatedArtifactSet, ChecksumEntry, ChecksumManifest, ReleaseError, ReleaseResult,
};
use crate::obs::emit_manifest_written;

/// Default manifest file name.
pub const DEFAULT_MANIFEST_NAME: &str = "checksums.txt";

/// Compute one SHA-256 digest per artifact, lexicographic by archive name.
///
/// Same bytes under the same names always yield the same manifest.
#[instrument(skip(artifacts), fields(count = artifacts.len()))]
pub fn compute_manifest(artifacts: &AggregatedArtifactSet) -> ReleaseResult<ChecksumManifest> {
    let mut entries = Vec::with_capacity(artifacts.len());
    for artifact in artifacts.iter() {
        let digest = hash_file(&artifact.archive_path)?;
        entries.push(ChecksumEntry {
            archive_name: artifact.archive_name.clone(),
            digest,
        });
    }
    Ok(ChecksumManifest::new(entries))
}

fn hash_file(path: &Path) -> ReleaseResult<ContentDigest> {
    ContentDigest::from_file(path).map_err(|e| {
        ReleaseError::Io(std::io::Error::other(format!(
            "failed to hash {}: {e}",
            path.display()
        )))
    })
}

/// Write the rendered manifest to `dir/file_name`.
///
/// Refuses a file name that collides with an artifact, since the manifest
/// must never cover itself.
pub fn write_manifest(
    manifest: &ChecksumManifest,
    dir: &Path,
    file_name: &str,
) -> ReleaseResult<PathBuf> {
    if manifest.digest_of(file_name).is_some() {
        return Err(ReleaseError::Config(format!(
            "manifest name {file_name} collides with an artifact"
        )));
    }
    let path = dir.join(file_name);
    std::fs::write(&path, manifest.render())?;
    emit_manifest_written(&path.to_string_lossy(), manifest.len());
    Ok(path)
}

/// Outcome of checking one manifest entry against a file on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerifyStatus {
    Ok,
    Mismatch { actual: String },
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyOutcome {
    pub archive_name: String,
    #[serde(flatten)]
    pub status: VerifyStatus,
}

/// Check every manifest entry against the files in `dir`.
pub fn verify_manifest(manifest: &ChecksumManifest, dir: &Path) -> ReleaseResult<Vec<VerifyOutcome>> {
    let mut outcomes = Vec::with_capacity(manifest.len());
    for entry in manifest.entries() {
        let path = dir.join(&entry.archive_name);
        let status = if !path.is_file() {
            VerifyStatus::Missing
        } else {
            let actual = hash_file(&path)?;
            if actual == entry.digest {
                VerifyStatus::Ok
            } else {
                VerifyStatus::Mismatch {
                    actual: actual.to_string(),
                }
            }
        };
        outcomes.push(VerifyOutcome {
            archive_name: entry.archive_name.clone(),
            status,
        });
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Artifact;

    fn set_in(dir: &Path, files: &[(&str, &str)]) -> AggregatedArtifactSet {
        let mut set = AggregatedArtifactSet::new();
        for (name, contents) in files {
            let path = dir.join(name);
            std::fs::write(&path, contents).unwrap();
            set.insert(Artifact::from_path(name, &path).unwrap()).unwrap();
        }
        set
    }

    #[test]
    fn manifest_is_sorted_by_archive_name() {
        let dir = tempfile::tempdir().unwrap();
        let set = set_in(dir.path(), &[("z.tar.gz", "z"), ("a.tar.gz", "a")]);
        let manifest = compute_manifest(&set).unwrap();

        let names: Vec<_> = manifest.entries().iter().map(|e| e.archive_name.as_str()).collect();
        assert_eq!(names, vec!["a.tar.gz", "z.tar.gz"]);
        assert_eq!(manifest.entries()[0].digest, ContentDigest::from_bytes(b"a"));
    }

    #[test]
    fn manifest_is_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        let set = set_in(dir.path(), &[("tgv-linux.tar.gz", "linux"), ("tgv-macos.tar.gz", "macos")]);

        let first = compute_manifest(&set).unwrap().render();
        let second = compute_manifest(&set).unwrap().render();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn write_refuses_self_reference() {
        let dir = tempfile::tempdir().unwrap();
        let set = set_in(dir.path(), &[("checksums.txt", "not a manifest")]);
        let manifest = compute_manifest(&set).unwrap();
        assert!(write_manifest(&manifest, dir.path(), DEFAULT_MANIFEST_NAME).is_err());
    }

    #[test]
    fn written_manifest_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let set = set_in(dir.path(), &[("a.tar.gz", "a"), ("b.tar.gz", "b")]);
        let manifest = compute_manifest(&set).unwrap();
        let path = write_manifest(&manifest, dir.path(), DEFAULT_MANIFEST_NAME).unwrap();

        let parsed = ChecksumManifest::parse(&std::fs::read_to_string(path).unwrap()).unwrap();
        let outcomes = verify_manifest(&parsed, dir.path()).unwrap();
        assert!(outcomes.iter().all(|o| o.status == VerifyStatus::Ok));
    }

    #[test]
    fn verify_reports_tampered_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let set = set_in(dir.path(), &[("a.tar.gz", "a"), ("b.tar.gz", "b")]);
        let manifest = compute_manifest(&set).unwrap();

        std::fs::write(dir.path().join("a.tar.gz"), b"tampered").unwrap();
        std::fs::remove_file(dir.path().join("b.tar.gz")).unwrap();

        let outcomes = verify_manifest(&manifest, dir.path()).unwrap();
        assert!(matches!(outcomes[0].status, VerifyStatus::Mismatch { .. }));
        assert_eq!(outcomes[1].status, VerifyStatus::Missing);
    }
}
