//! Idempotent tag materialization for triggers that do not carry a tag.

use relcast_state::{StorageError, TagRef, TagRegistry};
use serde::Serialize;
use tracing::instrument;

use crate::domain::{ReleaseError, ReleasePlan, ReleaseResult};
use crate::obs::{emit_tag_created, emit_tag_skipped};

/// What `ensure_tag` did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TagOutcome {
    /// The plan came from a tag push; the tag already exists.
    Skipped,
    /// A new tag was created and pushed.
    Created(TagRef),
}

/// Make sure `plan.tag_name` exists on the remote before publishing.
///
/// A tag that is already present is never moved: the registry rejects it
/// and this surfaces as `ReleaseError::TagAlreadyExists`.
#[instrument(skip(plan, registry), fields(tag = %plan.tag_name))]
pub async fn ensure_tag(
    plan: &ReleasePlan,
    registry: &dyn TagRegistry,
) -> ReleaseResult<TagOutcome> {
    if !plan.requires_tag_creation {
        emit_tag_skipped(&plan.tag_name);
        return Ok(TagOutcome::Skipped);
    }

    let tag = registry
        .create_tag(&plan.tag_name)
        .await
        .map_err(tag_error)?;
    emit_tag_created(&tag.name, &tag.commit);
    Ok(TagOutcome::Created(tag))
}

fn tag_error(err: StorageError) -> ReleaseError {
    match err {
        StorageError::TagAlreadyExists { tag } => ReleaseError::TagAlreadyExists { tag },
        other => ReleaseError::Tag(other.to_string()),
    }
}
