//! Structured observability hooks for release pipeline lifecycle events.
//!
//! This module provides:
//! - A run-scoped tracing span via `pipeline_span`
//! - Emission functions for each stage boundary: build, aggregate, checksum, tag, publish
//!
//! Events are emitted at `info!` level unless noted. For JSON output, pass
//! `--json` to the CLI.

use tracing::{info, warn};

/// Run-scoped span; every event of a run is recorded inside it.
///
/// # Example
///
/// ```ignore
/// pipeline.run_stages(..).instrument(pipeline_span(&run_id)).await
/// ```
pub fn pipeline_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("relcast.pipeline", run_id = %run_id)
}

/// Emit event: pipeline started for a resolved tag.
pub fn emit_pipeline_started(run_id: &str, tag: &str, targets: usize) {
    info!(event = "pipeline.started", run_id = %run_id, tag = %tag, targets = targets);
}

pub fn emit_build_started(platform_id: &str, triple: &str) {
    info!(event = "build.started", platform = %platform_id, triple = %triple);
}

/// Emit event: one build task finished, successfully or not.
pub fn emit_build_finished(platform_id: &str, duration_ms: u64, success: bool) {
    info!(
        event = "build.finished",
        platform = %platform_id,
        duration_ms = duration_ms,
        success = success,
    );
}

pub fn emit_artifacts_aggregated(count: usize, total_bytes: u64) {
    info!(event = "artifacts.aggregated", count = count, total_bytes = total_bytes);
}

pub fn emit_manifest_written(path: &str, entries: usize) {
    info!(event = "manifest.written", path = %path, entries = entries);
}

pub fn emit_tag_created(tag: &str, commit: &str) {
    info!(event = "tag.created", tag = %tag, commit = %commit);
}

/// Emit event: tag creation not required for this plan.
pub fn emit_tag_skipped(tag: &str) {
    info!(event = "tag.skipped", tag = %tag);
}

/// Emit event: a transient failure is being retried (warning level).
pub fn emit_upload_retry(
    operation: &str,
    attempt: u32,
    backoff_ms: u64,
    error: &dyn std::fmt::Display,
) {
    warn!(
        event = "upload.retry",
        operation = %operation,
        attempt = attempt,
        backoff_ms = backoff_ms,
        error = %error,
    );
}

pub fn emit_release_published(tag: &str, assets: usize, url: Option<&str>) {
    info!(
        event = "release.published",
        tag = %tag,
        assets = assets,
        url = url.unwrap_or(""),
    );
}

/// Emit event: an incomplete release was deleted again (warning level).
pub fn emit_release_withdrawn(tag: &str, error: &dyn std::fmt::Display) {
    warn!(event = "release.withdrawn", tag = %tag, error = %error);
}

/// Emit event: pipeline completed with duration.
pub fn emit_pipeline_finished(run_id: &str, duration_ms: u64) {
    info!(event = "pipeline.finished", run_id = %run_id, duration_ms = duration_ms);
}

/// Emit event: pipeline aborted at a stage (warning level).
pub fn emit_pipeline_failed(run_id: &str, stage: &str, error: &dyn std::fmt::Display) {
    warn!(event = "pipeline.failed", run_id = %run_id, stage = %stage, error = %error);
}
