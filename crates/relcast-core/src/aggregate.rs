//! Artifact aggregation: merge per-target staging areas into one flat directory.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, instrument};

use crate::domain::{AggregatedArtifactSet, Artifact, ReleaseError, ReleaseResult};
use crate::obs::emit_artifacts_aggregated;

/// Merge `artifacts` into `dest_dir`, keyed by archive name.
///
/// Checks, in order:
/// 1. No two artifacts share an archive name (`DuplicateArtifact`). Nothing
///    is copied when this fails, so neither artifact is kept.
/// 2. After copying, `dest_dir` holds exactly one file per successful build
///    (`MissingArtifact` otherwise).
///
/// `dest_dir` is created if needed and must not contain unrelated files.
#[instrument(skip(artifacts), fields(count = artifacts.len(), dest = %dest_dir.display()))]
pub fn aggregate(artifacts: Vec<Artifact>, dest_dir: &Path) -> ReleaseResult<AggregatedArtifactSet> {
    let expected = artifacts.len();

    let mut owners: HashMap<&str, &str> = HashMap::new();
    for artifact in &artifacts {
        if let Some(first) = owners.insert(&artifact.archive_name, &artifact.platform_id) {
            return Err(ReleaseError::DuplicateArtifact {
                archive_name: artifact.archive_name.clone(),
                first_platform: first.to_string(),
                second_platform: artifact.platform_id.clone(),
            });
        }
    }

    std::fs::create_dir_all(dest_dir)?;

    let mut set = AggregatedArtifactSet::new();
    for artifact in artifacts {
        let dest = dest_dir.join(&artifact.archive_name);
        let copied = std::fs::copy(&artifact.archive_path, &dest)?;
        debug!(
            platform = %artifact.platform_id,
            archive = %artifact.archive_name,
            bytes = copied,
            "Staged artifact"
        );
        set.insert(Artifact {
            archive_path: dest,
            size_bytes: copied,
            ..artifact
        })?;
    }

    let found = count_files(dest_dir)?;
    if found != expected || set.len() != expected {
        return Err(ReleaseError::MissingArtifact { expected, found });
    }

    emit_artifacts_aggregated(set.len(), set.total_bytes());
    Ok(set)
}

fn count_files(dir: &Path) -> ReleaseResult<usize> {
    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        if entry?.file_type()?.is_file() {
            count += 1;
        }
    }
    Ok(count)
}
