//! In-memory fakes for collaborator traits (testing and dry runs)
//!
//! Provides `MemoryTagRegistry` and `MemoryReleaseHost` that satisfy the
//! trait contracts without git or network access.

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::StorageError;
use crate::storage_traits::*;

// ---------------------------------------------------------------------------
// MemoryTagRegistry
// ---------------------------------------------------------------------------

/// In-memory tag namespace backed by a `BTreeMap<name, TagRef>`.
#[derive(Debug)]
pub struct MemoryTagRegistry {
    head_commit: String,
    tags: Mutex<BTreeMap<String, TagRef>>,
    create_calls: AtomicU32,
}

impl Default for MemoryTagRegistry {
    fn default() -> Self {
        Self::new("0000000000000000000000000000000000000000")
    }
}

impl MemoryTagRegistry {
    /// Registry whose "current commit" is `head_commit`.
    pub fn new(head_commit: &str) -> Self {
        Self {
            head_commit: head_commit.to_string(),
            tags: Mutex::new(BTreeMap::new()),
            create_calls: AtomicU32::new(0),
        }
    }

    /// Pre-populate a tag, as if pushed by someone else earlier.
    pub fn with_tag(self, name: &str) -> Self {
        self.tags.lock().unwrap().insert(
            name.to_string(),
            TagRef {
                name: name.to_string(),
                commit: self.head_commit.clone(),
            },
        );
        self
    }

    /// All tag names currently present, sorted.
    pub fn tag_names(&self) -> Vec<String> {
        self.tags.lock().unwrap().keys().cloned().collect()
    }

    /// Number of `create_tag` calls observed (successful or not).
    pub fn create_calls(&self) -> u32 {
        self.create_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TagRegistry for MemoryTagRegistry {
    async fn tag_exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self.tags.lock().unwrap().contains_key(name))
    }

    async fn create_tag(&self, name: &str) -> StorageResult<TagRef> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut tags = self.tags.lock().unwrap();
        if tags.contains_key(name) {
            return Err(StorageError::TagAlreadyExists {
                tag: name.to_string(),
            });
        }
        let tag = TagRef {
            name: name.to_string(),
            commit: self.head_commit.clone(),
        };
        tags.insert(name.to_string(), tag.clone());
        Ok(tag)
    }
}

// ---------------------------------------------------------------------------
// MemoryReleaseHost
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum InjectedFailure {
    Transport,
    Status(u16),
    /// The upload is stored but the caller sees a transport error.
    LostResponse,
}

/// In-memory release host. Keeps uploaded bytes so tests can inspect them.
#[derive(Debug, Default)]
pub struct MemoryReleaseHost {
    releases: Mutex<BTreeMap<String, HostedRelease>>,
    assets: Mutex<BTreeMap<String, Vec<(String, Vec<u8>)>>>,
    next_id: AtomicU64,
    create_calls: AtomicU32,
    delete_calls: AtomicU32,
    upload_attempts: AtomicU32,
    upload_failures: Mutex<VecDeque<InjectedFailure>>,
    rejected_names: Mutex<BTreeMap<String, u16>>,
}

impl MemoryReleaseHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` uploads fail with a transport error.
    pub fn fail_next_uploads(&self, count: usize) {
        let mut failures = self.upload_failures.lock().unwrap();
        failures.extend(std::iter::repeat(InjectedFailure::Transport).take(count));
    }

    /// Make the next `count` uploads fail with the given HTTP status.
    pub fn reject_next_uploads(&self, count: usize, status: u16) {
        let mut failures = self.upload_failures.lock().unwrap();
        failures.extend(std::iter::repeat(InjectedFailure::Status(status)).take(count));
    }

    /// Make the next `count` uploads succeed on the host while reporting a
    /// transport error to the caller.
    pub fn lose_next_upload_responses(&self, count: usize) {
        let mut failures = self.upload_failures.lock().unwrap();
        failures.extend(std::iter::repeat(InjectedFailure::LostResponse).take(count));
    }

    /// Reject every upload of `name` with the given HTTP status.
    pub fn reject_uploads_of(&self, name: &str, status: u16) {
        self.rejected_names
            .lock()
            .unwrap()
            .insert(name.to_string(), status);
    }

    /// The release registered for `tag`, if any.
    pub fn release(&self, tag: &str) -> Option<HostedRelease> {
        self.releases.lock().unwrap().get(tag).cloned()
    }

    /// Names of assets attached to the release for `tag`, in upload order.
    pub fn asset_names(&self, tag: &str) -> Vec<String> {
        self.assets
            .lock()
            .unwrap()
            .get(tag)
            .map(|assets| assets.iter().map(|(name, _)| name.clone()).collect())
            .unwrap_or_default()
    }

    /// Bytes uploaded for `name` on the release for `tag`.
    pub fn asset_bytes(&self, tag: &str, name: &str) -> Option<Vec<u8>> {
        self.assets.lock().unwrap().get(tag).and_then(|assets| {
            assets
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, bytes)| bytes.clone())
        })
    }

    /// Number of `create_release` calls observed.
    pub fn create_calls(&self) -> u32 {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Number of `delete_release` calls observed.
    pub fn delete_calls(&self) -> u32 {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Number of `upload_asset` calls observed, including failed attempts.
    pub fn upload_attempts(&self) -> u32 {
        self.upload_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReleaseHost for MemoryReleaseHost {
    async fn find_release(&self, tag: &str) -> StorageResult<Option<HostedRelease>> {
        Ok(self.releases.lock().unwrap().get(tag).cloned())
    }

    async fn create_release(&self, draft: &ReleaseDraft) -> StorageResult<HostedRelease> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut releases = self.releases.lock().unwrap();
        if releases.contains_key(&draft.tag_name) {
            return Err(StorageError::ReleaseAlreadyExists {
                tag: draft.tag_name.clone(),
            });
        }
        let release = HostedRelease {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            tag_name: draft.tag_name.clone(),
            name: draft.name.clone(),
            prerelease: draft.prerelease,
            draft: draft.draft,
            html_url: None,
            created_at: Utc::now(),
        };
        releases.insert(draft.tag_name.clone(), release.clone());
        Ok(release)
    }

    async fn upload_asset(
        &self,
        release: &HostedRelease,
        name: &str,
        path: &Path,
    ) -> StorageResult<AssetRecord> {
        self.upload_attempts.fetch_add(1, Ordering::SeqCst);

        if let Some(&status) = self.rejected_names.lock().unwrap().get(name) {
            return Err(StorageError::Rejected {
                status,
                message: format!("injected rejection of {name}"),
            });
        }

        let injected = self.upload_failures.lock().unwrap().pop_front();
        let lose_response = match injected {
            Some(InjectedFailure::Transport) => {
                return Err(StorageError::Transport(
                    "injected connection reset".to_string(),
                ))
            }
            Some(InjectedFailure::Status(status)) => {
                return Err(StorageError::Rejected {
                    status,
                    message: "injected rejection".to_string(),
                })
            }
            Some(InjectedFailure::LostResponse) => true,
            None => false,
        };

        if !self
            .releases
            .lock()
            .unwrap()
            .contains_key(&release.tag_name)
        {
            return Err(StorageError::Rejected {
                status: 404,
                message: format!("no release for tag {}", release.tag_name),
            });
        }

        let bytes = tokio::fs::read(path).await?;
        let mut assets = self.assets.lock().unwrap();
        let attached = assets.entry(release.tag_name.clone()).or_default();
        if attached.iter().any(|(n, _)| n == name) {
            return Err(StorageError::AssetAlreadyExists {
                tag: release.tag_name.clone(),
                name: name.to_string(),
            });
        }
        let size = bytes.len() as u64;
        attached.push((name.to_string(), bytes));

        if lose_response {
            return Err(StorageError::Transport(
                "injected timeout after upload".to_string(),
            ));
        }
        Ok(AssetRecord {
            name: name.to_string(),
            size,
            download_url: None,
        })
    }

    async fn find_asset(
        &self,
        release: &HostedRelease,
        name: &str,
    ) -> StorageResult<Option<AssetRecord>> {
        Ok(self
            .asset_bytes(&release.tag_name, name)
            .map(|bytes| AssetRecord {
                name: name.to_string(),
                size: bytes.len() as u64,
                download_url: None,
            }))
    }

    async fn delete_release(&self, release: &HostedRelease) -> StorageResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self
            .releases
            .lock()
            .unwrap()
            .remove(&release.tag_name)
            .is_none()
        {
            return Err(StorageError::Rejected {
                status: 404,
                message: format!("no release for tag {}", release.tag_name),
            });
        }
        self.assets.lock().unwrap().remove(&release.tag_name);
        Ok(())
    }
}
