//! Trigger resolution: turn a trigger event into a release plan.

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::{ReleaseError, ReleasePlan, ReleaseResult, TriggerEvent};

/// Literal prefix every release tag carries.
pub const TAG_PREFIX: &str = "v";

/// Fully qualified tag refs start with this.
const REFS_TAGS: &str = "refs/tags/";

/// Substrings that mark a tagged version as a pre-release.
///
/// A plain substring match; `v1.0.0-arc` counts as a pre-release too.
pub const PRERELEASE_MARKERS: [&str; 3] = ["alpha", "beta", "rc"];

/// Derive the release identity for `event`.
///
/// Pure: `current_date` is injected so manual-dispatch versions are testable.
pub fn resolve(event: &TriggerEvent, current_date: NaiveDate) -> ReleaseResult<ReleasePlan> {
    let plan = match event {
        TriggerEvent::TagPush { git_ref } => {
            // Hosts and registries key tags by short name, not the full ref.
            let tag_name = git_ref.strip_prefix(REFS_TAGS).unwrap_or(git_ref);
            let version = tag_name.strip_prefix(TAG_PREFIX).ok_or_else(|| {
                ReleaseError::InvalidTrigger(format!(
                    "tag '{git_ref}' does not start with '{TAG_PREFIX}'"
                ))
            })?;
            if version.is_empty() {
                return Err(ReleaseError::InvalidTrigger(format!(
                    "tag '{git_ref}' carries no version"
                )));
            }

            ReleasePlan {
                version: version.to_string(),
                tag_name: tag_name.to_string(),
                release_name: format!("{TAG_PREFIX}{version}"),
                is_prerelease: is_prerelease_version(version),
                requires_tag_creation: false,
            }
        }
        TriggerEvent::ManualDispatch { release_type } => {
            let date = current_date.format("%Y%m%d").to_string();
            let version = format!("{}-{}", release_type.as_str(), date);

            ReleasePlan {
                tag_name: version.clone(),
                release_name: format!("{} Build ({})", release_type.display_name(), date),
                version,
                is_prerelease: true,
                requires_tag_creation: true,
            }
        }
    };

    debug!(
        trigger = event.kind(),
        tag = %plan.tag_name,
        prerelease = plan.is_prerelease,
        "Resolved release plan"
    );
    Ok(plan)
}

/// Whether a tagged version is a pre-release.
pub fn is_prerelease_version(version: &str) -> bool {
    PRERELEASE_MARKERS.iter().any(|m| version.contains(m))
}
