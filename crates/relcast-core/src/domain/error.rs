//! Domain-level error taxonomy for relcast.

use serde::{Deserialize, Serialize};

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Setup,
    Resolve,
    Build,
    Aggregate,
    Checksum,
    Tag,
    Publish,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Setup => "setup",
            Stage::Resolve => "resolve",
            Stage::Build => "build",
            Stage::Aggregate => "aggregate",
            Stage::Checksum => "checksum",
            Stage::Tag => "tag",
            Stage::Publish => "publish",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One failed build task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetFailure {
    pub platform_id: String,
    pub reason: String,
}

fn describe_failures(failures: &[TargetFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.platform_id, f.reason))
        .collect::<Vec<_>>()
        .join(", ")
}

/// relcast domain errors.
#[derive(Debug, thiserror::Error)]
pub enum ReleaseError {
    #[error("invalid trigger: {0}")]
    InvalidTrigger(String),

    #[error(
        "build failed for {} target(s): {}",
        .failures.len(),
        describe_failures(.failures)
    )]
    BuildFailure { failures: Vec<TargetFailure> },

    #[error("duplicate artifact {archive_name}: produced by both {first_platform} and {second_platform}")]
    DuplicateArtifact {
        archive_name: String,
        first_platform: String,
        second_platform: String,
    },

    #[error("missing artifact: expected {expected} staged archive(s), found {found}")]
    MissingArtifact { expected: usize, found: usize },

    #[error("tag already exists: {tag}")]
    TagAlreadyExists { tag: String },

    #[error("tag error: {0}")]
    Tag(String),

    #[error("release already exists for tag {tag}")]
    ReleaseAlreadyExists { tag: String },

    #[error("publish error: {0}")]
    Publish(String),

    #[error("cancelled before {stage} completed")]
    Cancelled { stage: Stage },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReleaseError {
    /// Stage a variant belongs to. `None` for errors any stage can raise.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ReleaseError::InvalidTrigger(_) => Some(Stage::Resolve),
            ReleaseError::BuildFailure { .. } => Some(Stage::Build),
            ReleaseError::DuplicateArtifact { .. } | ReleaseError::MissingArtifact { .. } => {
                Some(Stage::Aggregate)
            }
            ReleaseError::TagAlreadyExists { .. } | ReleaseError::Tag(_) => Some(Stage::Tag),
            ReleaseError::ReleaseAlreadyExists { .. } | ReleaseError::Publish(_) => {
                Some(Stage::Publish)
            }
            ReleaseError::Cancelled { stage } => Some(*stage),
            ReleaseError::Config(_) => Some(Stage::Setup),
            ReleaseError::Serialization(_) | ReleaseError::Io(_) => None,
        }
    }

    /// Platform ids named by a `BuildFailure`, empty for every other variant.
    pub fn failed_platforms(&self) -> Vec<&str> {
        match self {
            ReleaseError::BuildFailure { failures } => {
                failures.iter().map(|f| f.platform_id.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// Result type for relcast domain operations.
pub type ReleaseResult<T> = std::result::Result<T, ReleaseError>;

/// A `ReleaseError` tagged with the stage that produced it.
///
/// This is the single failure outcome of a pipeline run.
#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: ReleaseError,
}

impl PipelineError {
    pub fn new(stage: Stage, source: ReleaseError) -> Self {
        Self { stage, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_failure_names_every_platform() {
        let err = ReleaseError::BuildFailure {
            failures: vec![
                TargetFailure {
                    platform_id: "linux-x86_64".to_string(),
                    reason: "exit code 101".to_string(),
                },
                TargetFailure {
                    platform_id: "macos-aarch64".to_string(),
                    reason: "timed out".to_string(),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 target(s)"));
        assert!(msg.contains("linux-x86_64 (exit code 101)"));
        assert!(msg.contains("macos-aarch64 (timed out)"));
        assert_eq!(err.failed_platforms(), vec!["linux-x86_64", "macos-aarch64"]);
    }

    #[test]
    fn duplicate_artifact_display() {
        let err = ReleaseError::DuplicateArtifact {
            archive_name: "tgv.tar.gz".to_string(),
            first_platform: "a".to_string(),
            second_platform: "b".to_string(),
        };
        assert!(err.to_string().contains("tgv.tar.gz"));
        assert!(err.failed_platforms().is_empty());
        assert_eq!(err.stage(), Some(Stage::Aggregate));
    }

    #[test]
    fn pipeline_error_names_stage() {
        let err = PipelineError::new(
            Stage::Tag,
            ReleaseError::TagAlreadyExists {
                tag: "nightly-20240305".to_string(),
            },
        );
        assert_eq!(
            err.to_string(),
            "tag stage failed: tag already exists: nightly-20240305"
        );
    }

    #[test]
    fn cancelled_display() {
        let err = ReleaseError::Cancelled {
            stage: Stage::Build,
        };
        assert_eq!(err.to_string(), "cancelled before build completed");
    }
}
