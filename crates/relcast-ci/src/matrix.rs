//! Build matrix execution: one isolated task per target, joined by a barrier.
//!
//! The caller injects the per-target build step as a [`BuilderFn`]; tests
//! pass deterministic stubs and production wires [`toolchain_builder`].

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use relcast_core::obs::{emit_build_finished, emit_build_started};
use relcast_core::{
    Artifact, BuildTarget, CancelSignal, ReleaseError, ReleaseResult, Stage, TargetFailure,
};
use tracing::{instrument, warn};

use crate::runner::CommandRunner;

/// Future returned by a build step: the path of the packed archive, or a reason.
pub type BuildFuture = BoxFuture<'static, Result<PathBuf, String>>;

/// Build step for one target: `(target, staging_dir) -> archive path`.
pub type BuilderFn = Arc<dyn Fn(BuildTarget, PathBuf) -> BuildFuture + Send + Sync>;

/// Wrap an async closure as a [`BuilderFn`].
pub fn builder_fn<F, Fut>(f: F) -> BuilderFn
where
    F: Fn(BuildTarget, PathBuf) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<PathBuf, String>> + Send + 'static,
{
    Arc::new(move |target, staging| f(target, staging).boxed())
}

/// Production build step: run the toolchain in `workspace`, then pack into the staging dir.
pub fn toolchain_builder(workspace: PathBuf) -> BuilderFn {
    builder_fn(move |target, staging| {
        let workspace = workspace.clone();
        async move { build_with_toolchain(&target, &workspace, &staging).await }
    })
}

/// Compile `target` and pack its binary into `staging/<archive_name>`.
///
/// Templates are expanded against the absolute workspace path, since the
/// pack step runs from the staging dir.
pub async fn build_with_toolchain(
    target: &BuildTarget,
    workspace: &Path,
    staging: &Path,
) -> Result<PathBuf, String> {
    let workspace = std::fs::canonicalize(workspace)
        .map_err(|e| format!("workspace {}: {e}", workspace.display()))?;
    let workspace = workspace.as_path();

    let build = CommandRunner::run(&target.build_argv(workspace), workspace, target.timeout_secs)
        .await
        .map_err(|e| format!("toolchain: {e}"))?;
    if !build.passed() {
        return Err(format!(
            "toolchain exited with {}: {}",
            build.exit_code,
            build.stderr_tail()
        ));
    }

    let pack = CommandRunner::run(&target.pack_argv(workspace), staging, target.timeout_secs)
        .await
        .map_err(|e| format!("pack: {e}"))?;
    if !pack.passed() {
        return Err(format!(
            "pack exited with {}: {}",
            pack.exit_code,
            pack.stderr_tail()
        ));
    }

    Ok(staging.join(&target.archive_name))
}

/// Run every target in parallel and join on all of them.
///
/// Each target builds into `staging_root/<platform_id>`, with at most
/// `max_parallel` running at once. The call waits for every task, then fails
/// with `BuildFailure` listing every failed target if any failed. Failed
/// targets leave no staging dir behind. Cancelling `cancel` kills in-flight
/// builds and yields `Cancelled { stage: Build }`.
///
/// Artifacts come back in target order.
#[instrument(skip_all, fields(targets = targets.len(), max_parallel = max_parallel))]
pub async fn run_all(
    targets: Vec<BuildTarget>,
    staging_root: &Path,
    max_parallel: usize,
    cancel: &CancelSignal,
    builder: BuilderFn,
) -> ReleaseResult<Vec<Artifact>> {
    std::fs::create_dir_all(staging_root)?;

    // Semaphore enforces max_parallel
    let sem = Arc::new(tokio::sync::Semaphore::new(max_parallel.max(1)));

    let mut platforms = Vec::with_capacity(targets.len());
    let mut tasks = Vec::with_capacity(targets.len());

    for target in targets {
        let staging = staging_root.join(&target.platform_id);
        let builder = Arc::clone(&builder);
        let cancel = cancel.clone();
        let sem = Arc::clone(&sem);
        platforms.push(target.platform_id.clone());

        tasks.push(tokio::spawn(async move {
            tokio::select! {
                result = build_one(target, staging.clone(), sem, builder) => {
                    if result.is_err() {
                        discard_staging(&staging);
                    }
                    result
                }
                _ = cancel.cancelled() => {
                    discard_staging(&staging);
                    Err("cancelled".to_string())
                }
            }
        }));
    }

    let joined = join_all(tasks).await;

    if cancel.is_cancelled() {
        return Err(ReleaseError::Cancelled {
            stage: Stage::Build,
        });
    }

    let mut artifacts = Vec::with_capacity(joined.len());
    let mut failures = Vec::new();
    for (platform_id, outcome) in platforms.into_iter().zip(joined) {
        match outcome {
            Ok(Ok(artifact)) => artifacts.push(artifact),
            Ok(Err(reason)) => failures.push(TargetFailure {
                platform_id,
                reason,
            }),
            Err(join_err) => failures.push(TargetFailure {
                platform_id,
                reason: format!("build task aborted: {join_err}"),
            }),
        }
    }

    if !failures.is_empty() {
        for failure in &failures {
            warn!(platform = %failure.platform_id, reason = %failure.reason, "Target failed");
        }
        return Err(ReleaseError::BuildFailure { failures });
    }
    Ok(artifacts)
}

async fn build_one(
    target: BuildTarget,
    staging: PathBuf,
    sem: Arc<tokio::sync::Semaphore>,
    builder: BuilderFn,
) -> Result<Artifact, String> {
    let _permit = sem
        .acquire_owned()
        .await
        .map_err(|_| "build slots closed".to_string())?;

    let platform_id = target.platform_id.clone();
    let archive_name = target.archive_name.clone();
    let start = Instant::now();
    emit_build_started(&platform_id, &target.toolchain_triple);

    let result = match prepare_staging(&staging) {
        Ok(()) => builder(target, staging)
            .await
            .and_then(|path| check_archive(&platform_id, &archive_name, &path)),
        Err(reason) => Err(reason),
    };

    emit_build_finished(
        &platform_id,
        start.elapsed().as_millis() as u64,
        result.is_ok(),
    );
    result
}

fn prepare_staging(staging: &Path) -> Result<(), String> {
    if staging.exists() {
        std::fs::remove_dir_all(staging)
            .map_err(|e| format!("cannot clear {}: {e}", staging.display()))?;
    }
    std::fs::create_dir_all(staging).map_err(|e| format!("cannot create {}: {e}", staging.display()))
}

/// The produced bundle must be the configured archive, present and non-empty.
fn check_archive(platform_id: &str, archive_name: &str, path: &Path) -> Result<Artifact, String> {
    let artifact = Artifact::from_path(platform_id, path).map_err(|e| e.to_string())?;
    if artifact.archive_name != archive_name {
        return Err(format!(
            "produced {} instead of {archive_name}",
            artifact.archive_name
        ));
    }
    Ok(artifact)
}

fn discard_staging(staging: &Path) {
    if let Err(e) = std::fs::remove_dir_all(staging) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(dir = %staging.display(), error = %e, "Failed to remove staging dir");
        }
    }
}
