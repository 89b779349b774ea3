//! relcast core library
//!
//! Release orchestration logic: trigger resolution, artifact aggregation,
//! checksums, tag management and publishing. Build execution lives in
//! `relcast-ci`; collaborator traits live in `relcast-state`.

pub mod aggregate;
pub mod cancel;
pub mod checksum;
pub mod config;
pub mod domain;
pub mod git;
pub mod obs;
pub mod publisher;
pub mod resolver;
pub mod retry;
pub mod tag_manager;
pub mod telemetry;

pub use aggregate::aggregate;
pub use cancel::CancelSignal;
pub use checksum::{
    compute_manifest, verify_manifest, write_manifest, VerifyOutcome, VerifyStatus,
    DEFAULT_MANIFEST_NAME,
};
pub use config::PipelineConfig;
pub use domain::{
    validate_targets, AggregatedArtifactSet, Artifact, AttachedFile, BuildTarget, ChecksumEntry,
    ChecksumManifest, PipelineError, Release, ReleaseError, ReleasePlan, ReleaseResult,
    ReleaseType, Stage, TargetFailure, TriggerEvent,
};
pub use git::{capture_head_sha, is_git_repo, GitTagRegistry};
pub use publisher::ReleasePublisher;
pub use resolver::{is_prerelease_version, resolve};
pub use retry::{retry_transient, RetryPolicy};
pub use tag_manager::{ensure_tag, TagOutcome};
pub use telemetry::init_tracing;

pub use relcast_state::{
    fakes::{MemoryReleaseHost, MemoryTagRegistry},
    ContentDigest, GithubConfig, GithubReleaseHost, ReleaseHost, StorageError, TagRegistry,
};
