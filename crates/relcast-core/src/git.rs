//! Git integration: repository state and the remote tag namespace.

use std::path::{Path, PathBuf};
use std::process::Command;

use async_trait::async_trait;
use relcast_state::{StorageError, StorageResult, TagRef, TagRegistry};
use tracing::{debug, warn};

/// Capture the HEAD commit SHA from a git repository.
///
/// Runs `git rev-parse HEAD` in the given directory.
pub fn capture_head_sha(repo_dir: &Path) -> StorageResult<String> {
    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(repo_dir)
        .output()
        .map_err(|e| StorageError::Vcs(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(StorageError::Vcs(format!(
            "git rev-parse HEAD failed: {}",
            stderr.trim()
        )));
    }

    let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if sha.is_empty() {
        return Err(StorageError::Vcs(
            "git rev-parse HEAD returned empty output".to_string(),
        ));
    }

    Ok(sha)
}

/// Check whether a directory is inside a git work tree.
pub fn is_git_repo(dir: &Path) -> bool {
    Command::new("git")
        .args(["rev-parse", "--is-inside-work-tree"])
        .current_dir(dir)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// `TagRegistry` over the git CLI: lightweight tags at HEAD, pushed to one remote.
#[derive(Debug, Clone)]
pub struct GitTagRegistry {
    repo_dir: PathBuf,
    remote: String,
}

struct GitOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

impl GitTagRegistry {
    pub fn new(repo_dir: impl Into<PathBuf>, remote: impl Into<String>) -> StorageResult<Self> {
        let repo_dir = repo_dir.into();
        if !is_git_repo(&repo_dir) {
            return Err(StorageError::Vcs(format!(
                "{} is not inside a git work tree",
                repo_dir.display()
            )));
        }
        Ok(Self {
            repo_dir,
            remote: remote.into(),
        })
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    async fn git(&self, args: &[&str]) -> StorageResult<GitOutput> {
        let output = tokio::process::Command::new("git")
            .args(args)
            .current_dir(&self.repo_dir)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| StorageError::Vcs(format!("failed to run git: {e}")))?;
        Ok(GitOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    async fn git_ok(&self, args: &[&str]) -> StorageResult<String> {
        let out = self.git(args).await?;
        if !out.success {
            return Err(StorageError::Vcs(format!(
                "git {} failed: {}",
                args.join(" "),
                out.stderr
            )));
        }
        Ok(out.stdout)
    }

    async fn local_tag_exists(&self, name: &str) -> StorageResult<bool> {
        let refname = format!("refs/tags/{name}");
        let out = self
            .git(&["rev-parse", "--quiet", "--verify", &refname])
            .await?;
        Ok(out.success)
    }
}

#[async_trait]
impl TagRegistry for GitTagRegistry {
    async fn tag_exists(&self, name: &str) -> StorageResult<bool> {
        let refname = format!("refs/tags/{name}");
        let listing = self
            .git_ok(&["ls-remote", "--tags", &self.remote, &refname])
            .await?;
        Ok(!listing.is_empty())
    }

    async fn create_tag(&self, name: &str) -> StorageResult<TagRef> {
        if self.tag_exists(name).await? || self.local_tag_exists(name).await? {
            return Err(StorageError::TagAlreadyExists {
                tag: name.to_string(),
            });
        }

        let commit = self.git_ok(&["rev-parse", "HEAD"]).await?;
        self.git_ok(&["tag", name, &commit]).await?;
        debug!(tag = %name, commit = %commit, "Created local tag");

        let refname = format!("refs/tags/{name}");
        let push = self.git(&["push", &self.remote, &refname]).await?;
        if !push.success {
            if let Err(e) = self.git_ok(&["tag", "-d", name]).await {
                warn!(tag = %name, error = %e, "Failed to remove local tag after rejected push");
            }
            // A concurrent run may have published the same tag first.
            if push.stderr.contains("already exists") {
                return Err(StorageError::TagAlreadyExists {
                    tag: name.to_string(),
                });
            }
            return Err(StorageError::Vcs(format!(
                "git push {} {refname} failed: {}",
                self.remote, push.stderr
            )));
        }

        Ok(TagRef {
            name: name.to_string(),
            commit,
        })
    }
}
