//! relcast domain model.

pub mod artifact;
pub mod error;
pub mod manifest;
pub mod plan;
pub mod release;
pub mod target;
pub mod trigger;

pub use artifact::{AggregatedArtifactSet, Artifact};
pub use error::{PipelineError, ReleaseError, ReleaseResult, Stage, TargetFailure};
pub use manifest::{ChecksumEntry, ChecksumManifest};
pub use plan::ReleasePlan;
pub use release::{AttachedFile, Release};
pub use target::{validate_targets, BuildTarget};
pub use trigger::{ReleaseType, TriggerEvent};
