//! The derived identity of one release.

use serde::{Deserialize, Serialize};

/// Version and release identity derived from a trigger.
///
/// Invariants (established by `resolver::resolve`):
/// - `requires_tag_creation` is true iff the trigger was a manual dispatch.
/// - `is_prerelease` is true for every manual dispatch, and for tag pushes
///   whose version contains `alpha`, `beta` or `rc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleasePlan {
    pub version: String,
    pub tag_name: String,
    pub release_name: String,
    pub is_prerelease: bool,
    pub requires_tag_creation: bool,
}
