use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use relcast_core::{
    aggregate, compute_manifest, ensure_tag, resolve, write_manifest, Artifact, ChecksumManifest,
    MemoryReleaseHost, MemoryTagRegistry, ReleaseError, ReleasePublisher, ReleaseType,
    RetryPolicy, TagOutcome, TagRegistry, TriggerEvent, DEFAULT_MANIFEST_NAME,
};

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
}

fn build_output(root: &Path, platform: &str, archive: &str) -> Artifact {
    let dir = root.join("build").join(platform);
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(archive);
    std::fs::write(&path, format!("{platform} binary")).unwrap();
    Artifact::from_path(platform, &path).unwrap()
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        backoff_base_ms: 1,
    }
}

// ---- tag push ----

#[tokio::test]
async fn tag_push_release_end_to_end() {
    let staging = tempfile::tempdir().unwrap();
    let dist = staging.path().join("dist");

    let plan = resolve(&TriggerEvent::tag_push("refs/tags/v1.2.3"), date()).unwrap();
    let set = aggregate(
        vec![
            build_output(staging.path(), "macos-aarch64", "tgv-aarch64-apple-darwin.tar.gz"),
            build_output(staging.path(), "linux-x86_64", "tgv-x86_64-unknown-linux-gnu.tar.gz"),
        ],
        &dist,
    )
    .unwrap();
    let manifest = compute_manifest(&set).unwrap();
    let manifest_path = write_manifest(&manifest, &dist, DEFAULT_MANIFEST_NAME).unwrap();

    let tags = Arc::new(MemoryTagRegistry::default().with_tag("v1.2.3"));
    let host = Arc::new(MemoryReleaseHost::new());

    let outcome = ensure_tag(&plan, tags.as_ref()).await.unwrap();
    assert_eq!(outcome, TagOutcome::Skipped);
    assert_eq!(tags.create_calls(), 0);

    let release = ReleasePublisher::new(host.clone(), tags.clone())
        .with_retry(fast_retry())
        .publish(&plan, &set, &manifest_path)
        .await
        .unwrap();

    assert_eq!(release.tag_name, "v1.2.3");
    assert_eq!(release.display_name, "v1.2.3");
    assert!(!release.is_prerelease);
    assert_eq!(
        release.attached_names(),
        vec![
            "tgv-aarch64-apple-darwin.tar.gz",
            "tgv-x86_64-unknown-linux-gnu.tar.gz",
            "checksums.txt",
        ]
    );

    // The uploaded manifest covers exactly the artifacts, not itself.
    let uploaded = host.asset_bytes("v1.2.3", "checksums.txt").unwrap();
    let parsed = ChecksumManifest::parse(&String::from_utf8(uploaded).unwrap()).unwrap();
    assert_eq!(parsed, manifest);
    assert!(parsed.digest_of("checksums.txt").is_none());
}

// ---- manual dispatch ----

#[tokio::test]
async fn nightly_dispatch_creates_tag_before_publishing() {
    let staging = tempfile::tempdir().unwrap();
    let dist = staging.path().join("dist");

    let plan = resolve(&TriggerEvent::manual(ReleaseType::Nightly), date()).unwrap();
    let set = aggregate(
        vec![build_output(staging.path(), "linux-x86_64", "tgv-linux.tar.gz")],
        &dist,
    )
    .unwrap();
    let manifest_path =
        write_manifest(&compute_manifest(&set).unwrap(), &dist, DEFAULT_MANIFEST_NAME).unwrap();

    let tags = Arc::new(MemoryTagRegistry::new("deadbeef"));
    let host = Arc::new(MemoryReleaseHost::new());

    let outcome = ensure_tag(&plan, tags.as_ref()).await.unwrap();
    assert!(matches!(outcome, TagOutcome::Created(ref t) if t.name == "nightly-20240305"));
    assert!(tags.tag_exists("nightly-20240305").await.unwrap());

    let release = ReleasePublisher::new(host.clone(), tags.clone())
        .publish(&plan, &set, &manifest_path)
        .await
        .unwrap();

    assert_eq!(release.display_name, "Nightly Build (20240305)");
    assert!(release.is_prerelease);
    assert!(!release.is_draft);
}

#[tokio::test]
async fn existing_nightly_tag_blocks_release() {
    let plan = resolve(&TriggerEvent::manual(ReleaseType::Nightly), date()).unwrap();
    let tags = MemoryTagRegistry::default().with_tag("nightly-20240305");

    let err = ensure_tag(&plan, &tags).await.unwrap_err();

    assert!(matches!(err, ReleaseError::TagAlreadyExists { ref tag } if tag == "nightly-20240305"));
}

// ---- aggregation integrity ----

#[tokio::test]
async fn colliding_archive_names_stop_before_checksums() {
    let staging = tempfile::tempdir().unwrap();
    let dist = staging.path().join("dist");

    let err = aggregate(
        vec![
            build_output(staging.path(), "a", "tgv.tar.gz"),
            build_output(staging.path(), "b", "tgv.tar.gz"),
        ],
        &dist,
    )
    .unwrap_err();

    assert!(matches!(err, ReleaseError::DuplicateArtifact { .. }));
    assert!(!dist.join("tgv.tar.gz").exists());
}
