//! Trait contract tests for TagRegistry and ReleaseHost.
//!
//! These tests verify the behavioral contracts of the collaborator traits
//! using in-memory fakes. Any conforming implementation must pass these.

use std::io::Write;

use relcast_state::fakes::{MemoryReleaseHost, MemoryTagRegistry};
use relcast_state::storage_traits::*;
use relcast_state::StorageError;

fn draft(tag: &str, prerelease: bool) -> ReleaseDraft {
    ReleaseDraft {
        tag_name: tag.to_string(),
        name: format!("Release {tag}"),
        prerelease,
        draft: false,
    }
}

fn asset_file(bytes: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file
}

// ===========================================================================
// TagRegistry contract tests
// ===========================================================================

#[tokio::test]
async fn tag_create_then_exists() {
    let registry = MemoryTagRegistry::new("abc123");
    assert!(!registry.tag_exists("nightly-20240305").await.unwrap());

    let tag = registry.create_tag("nightly-20240305").await.unwrap();
    assert_eq!(tag.name, "nightly-20240305");
    assert_eq!(tag.commit, "abc123");
    assert!(registry.tag_exists("nightly-20240305").await.unwrap());
}

#[tokio::test]
async fn tag_create_fails_if_present() {
    let registry = MemoryTagRegistry::new("abc123").with_tag("nightly-20240305");
    let err = registry.create_tag("nightly-20240305").await.unwrap_err();

    assert!(matches!(err, StorageError::TagAlreadyExists { ref tag } if tag == "nightly-20240305"));
    assert_eq!(registry.tag_names(), vec!["nightly-20240305".to_string()]);
}

#[tokio::test]
async fn tag_namespace_is_append_only() {
    let registry = MemoryTagRegistry::new("abc123");
    registry.create_tag("test-20240101").await.unwrap();
    registry.create_tag("test-20240102").await.unwrap();
    let _ = registry.create_tag("test-20240101").await;

    assert_eq!(
        registry.tag_names(),
        vec!["test-20240101".to_string(), "test-20240102".to_string()]
    );
    assert_eq!(registry.create_calls(), 3);
}

// ===========================================================================
// ReleaseHost contract tests
// ===========================================================================

#[tokio::test]
async fn release_create_then_find() {
    let host = MemoryReleaseHost::new();
    assert!(host.find_release("v1.2.3").await.unwrap().is_none());

    let created = host.create_release(&draft("v1.2.3", false)).await.unwrap();
    let found = host.find_release("v1.2.3").await.unwrap().unwrap();

    assert_eq!(created.id, found.id);
    assert_eq!(found.name, "Release v1.2.3");
    assert!(!found.prerelease);
    assert!(!found.draft);
}

#[tokio::test]
async fn release_create_fails_if_present() {
    let host = MemoryReleaseHost::new();
    host.create_release(&draft("v1.2.3", false)).await.unwrap();
    let err = host.create_release(&draft("v1.2.3", true)).await.unwrap_err();

    assert!(matches!(err, StorageError::ReleaseAlreadyExists { .. }));
    // First registration is untouched.
    assert!(!host.release("v1.2.3").unwrap().prerelease);
}

#[tokio::test]
async fn upload_keeps_bytes_and_order() {
    let host = MemoryReleaseHost::new();
    let release = host.create_release(&draft("v1.2.3", false)).await.unwrap();

    let a = asset_file(b"linux archive");
    let b = asset_file(b"checksums");
    let rec = host.upload_asset(&release, "tgv-linux.tar.gz", a.path()).await.unwrap();
    host.upload_asset(&release, "checksums.txt", b.path()).await.unwrap();

    assert_eq!(rec.size, 13);
    assert_eq!(
        host.asset_names("v1.2.3"),
        vec!["tgv-linux.tar.gz".to_string(), "checksums.txt".to_string()]
    );
    assert_eq!(host.asset_bytes("v1.2.3", "checksums.txt").unwrap(), b"checksums");
}

#[tokio::test]
async fn upload_same_name_twice_fails() {
    let host = MemoryReleaseHost::new();
    let release = host.create_release(&draft("v1.2.3", false)).await.unwrap();
    let a = asset_file(b"bytes");

    host.upload_asset(&release, "tgv.tar.gz", a.path()).await.unwrap();
    let err = host.upload_asset(&release, "tgv.tar.gz", a.path()).await.unwrap_err();

    assert!(matches!(err, StorageError::AssetAlreadyExists { .. }));
}

#[tokio::test]
async fn injected_upload_failures_are_consumed_in_order() {
    let host = MemoryReleaseHost::new();
    let release = host.create_release(&draft("v1.2.3", false)).await.unwrap();
    let a = asset_file(b"bytes");
    host.fail_next_uploads(1);
    host.reject_next_uploads(1, 401);

    let first = host.upload_asset(&release, "a", a.path()).await.unwrap_err();
    let second = host.upload_asset(&release, "a", a.path()).await.unwrap_err();
    let third = host.upload_asset(&release, "a", a.path()).await;

    assert!(first.is_transient());
    assert!(!second.is_transient());
    assert!(third.is_ok());
    assert_eq!(host.upload_attempts(), 3);
}

#[tokio::test]
async fn find_asset_reports_uploaded_size() {
    let host = MemoryReleaseHost::new();
    let release = host.create_release(&draft("v1.2.3", false)).await.unwrap();
    let a = asset_file(b"linux archive");

    assert!(host.find_asset(&release, "tgv.tar.gz").await.unwrap().is_none());
    host.upload_asset(&release, "tgv.tar.gz", a.path()).await.unwrap();

    let found = host.find_asset(&release, "tgv.tar.gz").await.unwrap().unwrap();
    assert_eq!(found.size, 13);
}

#[tokio::test]
async fn lost_upload_response_still_stores_the_file() {
    let host = MemoryReleaseHost::new();
    let release = host.create_release(&draft("v1.2.3", false)).await.unwrap();
    let a = asset_file(b"bytes");
    host.lose_next_upload_responses(1);

    let err = host.upload_asset(&release, "a", a.path()).await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(host.asset_names("v1.2.3"), vec!["a".to_string()]);

    let retry = host.upload_asset(&release, "a", a.path()).await.unwrap_err();
    assert!(matches!(retry, StorageError::AssetAlreadyExists { .. }));
}

#[tokio::test]
async fn delete_release_removes_release_and_files() {
    let host = MemoryReleaseHost::new();
    let release = host.create_release(&draft("v1.2.3", false)).await.unwrap();
    let a = asset_file(b"bytes");
    host.upload_asset(&release, "a", a.path()).await.unwrap();

    host.delete_release(&release).await.unwrap();

    assert!(host.find_release("v1.2.3").await.unwrap().is_none());
    assert!(host.asset_names("v1.2.3").is_empty());
    assert!(host.delete_release(&release).await.is_err());

    // The tag is free for a fresh release afterwards.
    host.create_release(&draft("v1.2.3", false)).await.unwrap();
}

#[tokio::test]
async fn rejected_name_fails_every_attempt() {
    let host = MemoryReleaseHost::new();
    let release = host.create_release(&draft("v1.2.3", false)).await.unwrap();
    let a = asset_file(b"bytes");
    host.reject_uploads_of("b", 401);

    host.upload_asset(&release, "a", a.path()).await.unwrap();
    for _ in 0..2 {
        let err = host.upload_asset(&release, "b", a.path()).await.unwrap_err();
        assert!(matches!(err, StorageError::Rejected { status: 401, .. }));
    }
}
