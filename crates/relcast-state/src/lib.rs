//! relcast-state: collaborator interfaces for relcast
//!
//! A release run touches exactly two pieces of shared state outside the
//! process: the remote tag namespace and the release registry of the hosting
//! service. This crate defines narrow traits for both, so the orchestration
//! logic stays testable without a live network.
//!
//! ## Key Components
//!
//! - `TagRegistry`: create-if-absent access to the remote tag namespace
//! - `ReleaseHost`: create-if-absent releases plus asset uploads
//! - `GithubReleaseHost`: `ReleaseHost` over the GitHub REST API
//! - `fakes`: in-memory implementations for tests and dry runs

mod error;
pub mod fakes;
pub mod github;
pub mod storage_traits;

pub use error::StorageError;
pub use github::{GithubConfig, GithubReleaseHost};
pub use storage_traits::{
    AssetRecord, ContentDigest, HostedRelease, ReleaseDraft, ReleaseHost, StorageResult, TagRef,
    TagRegistry,
};
