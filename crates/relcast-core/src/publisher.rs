//! Release publication: the only irreversible step of a run.

use std::path::Path;
use std::sync::Arc;

use relcast_state::{
    AssetRecord, HostedRelease, ReleaseDraft, ReleaseHost, StorageError, TagRegistry,
};
use tracing::{debug, instrument};

use crate::domain::{
    AggregatedArtifactSet, AttachedFile, ReleaseError, ReleasePlan, ReleaseResult, Release,
};
use crate::obs::{emit_release_published, emit_release_withdrawn};
use crate::retry::{retry_transient, RetryPolicy};

/// Publishes one release per plan through a `ReleaseHost`.
#[derive(Clone)]
pub struct ReleasePublisher {
    host: Arc<dyn ReleaseHost>,
    tags: Arc<dyn TagRegistry>,
    retry: RetryPolicy,
}

impl ReleasePublisher {
    pub fn new(host: Arc<dyn ReleaseHost>, tags: Arc<dyn TagRegistry>) -> Self {
        Self {
            host,
            tags,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Create the release for `plan` and attach every artifact, then the manifest.
    ///
    /// The tag must already exist on the remote. A release already
    /// registered for the tag fails with `ReleaseAlreadyExists`. Each upload
    /// is retried on transient errors; the release as a whole is not. If an
    /// upload still fails, the release is deleted again before returning, so
    /// the host never keeps a release with part of its files.
    #[instrument(skip_all, fields(tag = %plan.tag_name, artifacts = artifacts.len()))]
    pub async fn publish(
        &self,
        plan: &ReleasePlan,
        artifacts: &AggregatedArtifactSet,
        manifest_path: &Path,
    ) -> ReleaseResult<Release> {
        let manifest_name = manifest_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                ReleaseError::Publish(format!(
                    "manifest path {} has no file name",
                    manifest_path.display()
                ))
            })?;
        if artifacts.get(&manifest_name).is_some() {
            return Err(ReleaseError::Publish(format!(
                "manifest name {manifest_name} collides with an artifact"
            )));
        }

        let tag_present = self
            .tags
            .tag_exists(&plan.tag_name)
            .await
            .map_err(|e| ReleaseError::Publish(format!("tag lookup failed: {e}")))?;
        if !tag_present {
            return Err(ReleaseError::Publish(format!(
                "tag {} does not exist on the remote",
                plan.tag_name
            )));
        }

        let draft = ReleaseDraft {
            tag_name: plan.tag_name.clone(),
            name: plan.release_name.clone(),
            prerelease: plan.is_prerelease,
            draft: false,
        };
        let hosted = self
            .host
            .create_release(&draft)
            .await
            .map_err(|e| match e {
                StorageError::ReleaseAlreadyExists { tag } => {
                    ReleaseError::ReleaseAlreadyExists { tag }
                }
                other => ReleaseError::Publish(format!("release creation failed: {other}")),
            })?;
        debug!(release_id = hosted.id, "Created release");

        let attached_files = match self
            .upload_all(&hosted, artifacts, &manifest_name, manifest_path)
            .await
        {
            Ok(files) => files,
            Err(err) => return Err(self.withdraw(&hosted, err).await),
        };

        emit_release_published(&hosted.tag_name, attached_files.len(), hosted.html_url.as_deref());

        Ok(Release {
            tag_name: hosted.tag_name,
            display_name: hosted.name,
            is_prerelease: hosted.prerelease,
            is_draft: hosted.draft,
            attached_files,
            host_id: hosted.id,
            html_url: hosted.html_url,
        })
    }

    async fn upload_all(
        &self,
        release: &HostedRelease,
        artifacts: &AggregatedArtifactSet,
        manifest_name: &str,
        manifest_path: &Path,
    ) -> ReleaseResult<Vec<AttachedFile>> {
        let mut attached_files = Vec::with_capacity(artifacts.len() + 1);
        for artifact in artifacts.iter() {
            attached_files.push(
                self.upload(release, &artifact.archive_name, &artifact.archive_path)
                    .await?,
            );
        }
        attached_files.push(self.upload(release, manifest_name, manifest_path).await?);
        Ok(attached_files)
    }

    /// Delete a release whose uploads failed, returning the error to report.
    async fn withdraw(&self, release: &HostedRelease, err: ReleaseError) -> ReleaseError {
        match self.host.delete_release(release).await {
            Ok(()) => {
                emit_release_withdrawn(&release.tag_name, &err);
                err
            }
            Err(cleanup) => ReleaseError::Publish(format!(
                "{err}; deleting the incomplete release {} also failed: {cleanup}",
                release.tag_name
            )),
        }
    }

    async fn upload(
        &self,
        release: &HostedRelease,
        name: &str,
        path: &Path,
    ) -> ReleaseResult<AttachedFile> {
        let mut attempts = 0u32;
        let outcome = retry_transient(&self.retry, "upload_asset", || {
            attempts += 1;
            self.host.upload_asset(release, name, path)
        })
        .await;

        let record = match outcome {
            Ok(record) => record,
            // An earlier attempt may have landed even though its response was lost.
            Err(StorageError::AssetAlreadyExists { .. }) if attempts > 1 => {
                self.recover_upload(release, name, path).await?
            }
            Err(e) => {
                return Err(ReleaseError::Publish(format!(
                    "upload of {name} failed: {e}"
                )))
            }
        };

        debug!(asset = %record.name, bytes = record.size, "Uploaded asset");
        Ok(AttachedFile {
            name: record.name,
            path: path.to_path_buf(),
            size_bytes: record.size,
        })
    }

    /// Accept an asset already on the host when it has the local file's size.
    async fn recover_upload(
        &self,
        release: &HostedRelease,
        name: &str,
        path: &Path,
    ) -> ReleaseResult<AssetRecord> {
        let local_size = std::fs::metadata(path)?.len();
        let found = self
            .host
            .find_asset(release, name)
            .await
            .map_err(|e| ReleaseError::Publish(format!("lookup of {name} failed: {e}")))?;
        match found {
            Some(record) if record.size == local_size => {
                debug!(asset = %name, "Upload landed on an earlier attempt");
                Ok(record)
            }
            Some(record) => Err(ReleaseError::Publish(format!(
                "upload of {name} failed: host holds {} bytes, expected {local_size}",
                record.size
            ))),
            None => Err(ReleaseError::Publish(format!(
                "upload of {name} failed: host reports it attached but cannot list it"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Artifact;
    use relcast_state::fakes::{MemoryReleaseHost, MemoryTagRegistry};
    use std::path::PathBuf;

    struct Fixture {
        _dir: tempfile::TempDir,
        set: AggregatedArtifactSet,
        manifest: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mut set = AggregatedArtifactSet::new();
        for (platform, name) in [("macos", "tgv-macos.tar.gz"), ("linux", "tgv-linux.tar.gz")] {
            let path = dir.path().join(name);
            std::fs::write(&path, platform).unwrap();
            set.insert(Artifact::from_path(platform, &path).unwrap()).unwrap();
        }
        let manifest = dir.path().join("checksums.txt");
        std::fs::write(&manifest, "digest  tgv-linux.tar.gz\n").unwrap();
        Fixture {
            _dir: dir,
            set,
            manifest,
        }
    }

    fn plan(tag: &str, prerelease: bool) -> ReleasePlan {
        ReleasePlan {
            version: tag.trim_start_matches('v').to_string(),
            tag_name: tag.to_string(),
            release_name: tag.to_string(),
            is_prerelease: prerelease,
            requires_tag_creation: false,
        }
    }

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            backoff_base_ms: 1,
        }
    }

    #[tokio::test]
    async fn publishes_artifacts_then_manifest() {
        let f = fixture();
        let host = Arc::new(MemoryReleaseHost::new());
        let tags = Arc::new(MemoryTagRegistry::default().with_tag("v1.2.3"));
        let publisher = ReleasePublisher::new(host.clone(), tags).with_retry(fast());

        let release = publisher
            .publish(&plan("v1.2.3", false), &f.set, &f.manifest)
            .await
            .unwrap();

        assert_eq!(
            release.attached_names(),
            vec!["tgv-linux.tar.gz", "tgv-macos.tar.gz", "checksums.txt"]
        );
        assert!(!release.is_draft);
        assert!(!release.is_prerelease);
        assert_eq!(release.display_name, "v1.2.3");
        assert_eq!(
            host.asset_names("v1.2.3"),
            vec!["tgv-linux.tar.gz", "tgv-macos.tar.gz", "checksums.txt"]
        );
        assert_eq!(
            host.asset_bytes("v1.2.3", "tgv-linux.tar.gz").unwrap(),
            b"linux"
        );
    }

    #[tokio::test]
    async fn prerelease_flag_is_forwarded() {
        let f = fixture();
        let host = Arc::new(MemoryReleaseHost::new());
        let tags = Arc::new(MemoryTagRegistry::default().with_tag("v2.0.0-rc1"));
        ReleasePublisher::new(host.clone(), tags)
            .publish(&plan("v2.0.0-rc1", true), &f.set, &f.manifest)
            .await
            .unwrap();

        assert!(host.release("v2.0.0-rc1").unwrap().prerelease);
    }

    #[tokio::test]
    async fn missing_tag_is_an_ordering_violation() {
        let f = fixture();
        let host = Arc::new(MemoryReleaseHost::new());
        let tags = Arc::new(MemoryTagRegistry::default());
        let err = ReleasePublisher::new(host.clone(), tags)
            .publish(&plan("v1.2.3", false), &f.set, &f.manifest)
            .await
            .unwrap_err();

        assert!(matches!(err, ReleaseError::Publish(_)));
        assert_eq!(host.create_calls(), 0);
    }

    #[tokio::test]
    async fn second_release_for_tag_is_rejected() {
        let f = fixture();
        let host = Arc::new(MemoryReleaseHost::new());
        let tags = Arc::new(MemoryTagRegistry::default().with_tag("v1.2.3"));
        let publisher = ReleasePublisher::new(host.clone(), tags).with_retry(fast());

        publisher
            .publish(&plan("v1.2.3", false), &f.set, &f.manifest)
            .await
            .unwrap();
        let err = publisher
            .publish(&plan("v1.2.3", false), &f.set, &f.manifest)
            .await
            .unwrap_err();

        assert!(matches!(err, ReleaseError::ReleaseAlreadyExists { .. }));
        assert_eq!(host.asset_names("v1.2.3").len(), 3);
    }

    #[tokio::test]
    async fn transient_upload_failures_are_retried() {
        let f = fixture();
        let host = Arc::new(MemoryReleaseHost::new());
        host.fail_next_uploads(2);
        let tags = Arc::new(MemoryTagRegistry::default().with_tag("v1.2.3"));

        let release = ReleasePublisher::new(host.clone(), tags)
            .with_retry(fast())
            .publish(&plan("v1.2.3", false), &f.set, &f.manifest)
            .await
            .unwrap();

        assert_eq!(release.attached_files.len(), 3);
        assert_eq!(host.upload_attempts(), 5);
    }

    #[tokio::test]
    async fn permanent_upload_failure_aborts() {
        let f = fixture();
        let host = Arc::new(MemoryReleaseHost::new());
        host.reject_next_uploads(1, 403);
        let tags = Arc::new(MemoryTagRegistry::default().with_tag("v1.2.3"));

        let err = ReleasePublisher::new(host.clone(), tags)
            .with_retry(fast())
            .publish(&plan("v1.2.3", false), &f.set, &f.manifest)
            .await
            .unwrap_err();

        assert!(matches!(err, ReleaseError::Publish(_)));
        assert_eq!(host.upload_attempts(), 1);
        assert!(host.release("v1.2.3").is_none());
        assert_eq!(host.delete_calls(), 1);
    }

    #[tokio::test]
    async fn failure_after_partial_upload_leaves_no_release() {
        let f = fixture();
        let host = Arc::new(MemoryReleaseHost::new());
        host.reject_uploads_of("tgv-macos.tar.gz", 401);
        let tags = Arc::new(MemoryTagRegistry::default().with_tag("v1.2.3"));

        let err = ReleasePublisher::new(host.clone(), tags)
            .with_retry(fast())
            .publish(&plan("v1.2.3", false), &f.set, &f.manifest)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("tgv-macos.tar.gz"));
        assert!(host.release("v1.2.3").is_none());
        assert!(host.asset_names("v1.2.3").is_empty());
    }

    #[tokio::test]
    async fn upload_with_lost_response_is_not_uploaded_twice() {
        let f = fixture();
        let host = Arc::new(MemoryReleaseHost::new());
        host.lose_next_upload_responses(1);
        let tags = Arc::new(MemoryTagRegistry::default().with_tag("v1.2.3"));

        let release = ReleasePublisher::new(host.clone(), tags)
            .with_retry(fast())
            .publish(&plan("v1.2.3", false), &f.set, &f.manifest)
            .await
            .unwrap();

        assert_eq!(
            release.attached_names(),
            vec!["tgv-linux.tar.gz", "tgv-macos.tar.gz", "checksums.txt"]
        );
        assert_eq!(release.attached_files[0].size_bytes, 5);
        assert_eq!(host.upload_attempts(), 4);
        assert_eq!(host.asset_names("v1.2.3").len(), 3);
    }

    #[tokio::test]
    async fn existing_asset_on_first_attempt_is_still_an_error() {
        let f = fixture();
        let host = Arc::new(MemoryReleaseHost::new());
        let tags = Arc::new(MemoryTagRegistry::default().with_tag("v1.2.3"));
        let publisher = ReleasePublisher::new(host.clone(), tags).with_retry(fast());
        let hosted = host
            .create_release(&ReleaseDraft {
                tag_name: "v1.2.3".to_string(),
                name: "v1.2.3".to_string(),
                prerelease: false,
                draft: false,
            })
            .await
            .unwrap();

        publisher
            .upload(&hosted, "tgv-linux.tar.gz", &f.manifest)
            .await
            .unwrap();
        let err = publisher
            .upload(&hosted, "tgv-linux.tar.gz", &f.manifest)
            .await
            .unwrap_err();

        assert!(matches!(err, ReleaseError::Publish(_)));
    }
}
