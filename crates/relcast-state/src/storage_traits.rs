//! Collaborator trait definitions for relcast
//!
//! These traits define the two pieces of process-external shared state a
//! release run touches:
//! - `TagRegistry`: the remote tag namespace (create-if-absent)
//! - `ReleaseHost`: the release registry and asset storage (create-if-absent)
//!
//! Both are append-only from relcast's point of view: nothing is ever updated
//! in place. In-memory fakes are provided for testing via the `fakes` module.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::StorageError;

/// Result type for collaborator operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// ContentDigest
// ---------------------------------------------------------------------------

/// Content digest (SHA-256 hex string).
///
/// The inner field is private to guarantee the string is always valid
/// lowercase hex produced by `from_bytes`/`from_file` or validated via
/// `TryFrom<String>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the SHA-256 digest of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentDigest(hex::encode(hasher.finalize()))
    }

    /// Compute the SHA-256 digest of a file, streaming its contents.
    pub fn from_file(path: &Path) -> StorageResult<Self> {
        let mut file = std::fs::File::open(path)?;
        let mut hasher = Sha256::new();
        std::io::copy(&mut file, &mut hasher)?;
        Ok(ContentDigest(hex::encode(hasher.finalize())))
    }

    /// Return the full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = StorageError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StorageError::InvalidDigest { digest: s });
        }
        Ok(ContentDigest(s.to_ascii_lowercase()))
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// TagRegistry: remote tag namespace
// ---------------------------------------------------------------------------

/// A tag as it exists in the remote namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRef {
    /// Short tag name (no `refs/tags/` prefix)
    pub name: String,
    /// Commit the tag points at
    pub commit: String,
}

/// Remote tag namespace.
///
/// Guarantees:
/// - `create_tag` never moves or overwrites an existing tag; it fails with
///   `StorageError::TagAlreadyExists` instead.
/// - A tag returned by `create_tag` is visible to `tag_exists` afterwards.
#[async_trait]
pub trait TagRegistry: Send + Sync {
    /// Whether a tag with this name is present on the remote.
    async fn tag_exists(&self, name: &str) -> StorageResult<bool>;

    /// Create `name` at the current commit and publish it to the remote.
    async fn create_tag(&self, name: &str) -> StorageResult<TagRef>;
}

// ---------------------------------------------------------------------------
// ReleaseHost: release registry and asset storage
// ---------------------------------------------------------------------------

/// Fields sent to the host when creating a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseDraft {
    /// Tag the release is keyed by
    pub tag_name: String,
    /// Display name
    pub name: String,
    /// Pre-release flag
    pub prerelease: bool,
    /// Draft flag
    pub draft: bool,
}

/// A release object as registered on the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostedRelease {
    /// Host-assigned identifier
    pub id: u64,
    pub tag_name: String,
    pub name: String,
    pub prerelease: bool,
    pub draft: bool,
    /// Where the release can be viewed, if the host exposes one
    pub html_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// File name as shown on the release
    pub name: String,
    /// Uploaded size in bytes
    pub size: u64,
    /// Download location, if the host exposes one
    pub download_url: Option<String>,
}

/// Release registry.
///
/// Semantics:
/// - `create_release` is create-if-absent: a second release for the same
///   tag fails with `StorageError::ReleaseAlreadyExists`.
/// - `upload_asset` attaches one file; re-uploading a name fails with
///   `StorageError::AssetAlreadyExists`.
/// - Releases are never edited. `delete_release` exists only to withdraw a
///   release whose uploads did not complete; it removes the attached files too.
#[async_trait]
pub trait ReleaseHost: Send + Sync {
    /// Look up the release registered for `tag`, if any.
    async fn find_release(&self, tag: &str) -> StorageResult<Option<HostedRelease>>;

    /// Register a new release.
    async fn create_release(&self, draft: &ReleaseDraft) -> StorageResult<HostedRelease>;

    /// Attach the file at `path` to `release` under `name`.
    async fn upload_asset(
        &self,
        release: &HostedRelease,
        name: &str,
        path: &Path,
    ) -> StorageResult<AssetRecord>;

    /// The file attached to `release` under `name`, if any.
    async fn find_asset(
        &self,
        release: &HostedRelease,
        name: &str,
    ) -> StorageResult<Option<AssetRecord>>;

    /// Remove `release` and every file attached to it.
    async fn delete_release(&self, release: &HostedRelease) -> StorageResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn digest_of_known_input() {
        let digest = ContentDigest::from_bytes(b"abc");
        assert_eq!(
            digest.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(digest.short(), "ba7816bf8f01");
    }

    #[test]
    fn file_digest_matches_byte_digest() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"archive bytes").unwrap();
        let from_file = ContentDigest::from_file(file.path()).unwrap();
        assert_eq!(from_file, ContentDigest::from_bytes(b"archive bytes"));
    }

    #[test]
    fn try_from_rejects_short_or_non_hex() {
        assert!(ContentDigest::try_from("abc".to_string()).is_err());
        assert!(ContentDigest::try_from("z".repeat(64)).is_err());
    }

    #[test]
    fn try_from_lowercases() {
        let upper = "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD";
        let digest = ContentDigest::try_from(upper.to_string()).unwrap();
        assert_eq!(digest, ContentDigest::from_bytes(b"abc"));
    }
}
