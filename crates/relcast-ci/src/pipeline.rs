//! End-to-end release pipeline.
//!
//! Resolve → build matrix → aggregate → checksum → tag → publish, strictly in
//! that order. Every failure is reported once, tagged with its stage.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use relcast_core::obs::{
    emit_pipeline_failed, emit_pipeline_finished, emit_pipeline_started, pipeline_span,
};
use relcast_core::{
    aggregate, compute_manifest, ensure_tag, resolve, validate_targets, write_manifest,
    BuildTarget, CancelSignal, PipelineConfig, PipelineError, Release, ReleaseError, ReleaseHost,
    ReleasePlan, ReleasePublisher, ReleaseResult, Stage, TagOutcome, TagRegistry, TriggerEvent,
};
use serde::Serialize;
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::matrix::{run_all, BuilderFn};

/// Outcome of a successful pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    /// Unique id of this run, as tagged on every log line.
    pub run_id: String,
    pub plan: ReleasePlan,
    pub tag: TagOutcome,
    pub manifest_path: PathBuf,
    pub release: Release,
    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

/// Release pipeline wired to its collaborators.
pub struct ReleasePipeline {
    config: PipelineConfig,
    targets: Vec<BuildTarget>,
    builder: BuilderFn,
    tags: Arc<dyn TagRegistry>,
    publisher: ReleasePublisher,
    cancel: CancelSignal,
}

impl ReleasePipeline {
    pub fn new(
        config: PipelineConfig,
        targets: Vec<BuildTarget>,
        builder: BuilderFn,
        tags: Arc<dyn TagRegistry>,
        host: Arc<dyn ReleaseHost>,
    ) -> Self {
        let publisher = ReleasePublisher::new(host, Arc::clone(&tags)).with_retry(config.retry);
        Self {
            config,
            targets,
            builder,
            tags,
            publisher,
            cancel: CancelSignal::new(),
        }
    }

    /// Share an externally controlled cancellation signal.
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_signal(&self) -> CancelSignal {
        self.cancel.clone()
    }

    /// Run every stage for `event`, using `today` for dispatch versions.
    pub async fn run(
        &self,
        event: &TriggerEvent,
        today: NaiveDate,
    ) -> Result<PipelineReport, PipelineError> {
        let run_id = Uuid::new_v4().to_string();
        let span = pipeline_span(&run_id);
        let start = Instant::now();

        let outcome = self
            .run_stages(&run_id, event, today, start)
            .instrument(span.clone())
            .await;
        let _entered = span.enter();
        match outcome {
            Ok(report) => {
                emit_pipeline_finished(&run_id, report.duration_ms);
                Ok(report)
            }
            Err(err) => {
                emit_pipeline_failed(&run_id, err.stage.name(), &err.source);
                Err(err)
            }
        }
    }

    async fn run_stages(
        &self,
        run_id: &str,
        event: &TriggerEvent,
        today: NaiveDate,
        start: Instant,
    ) -> Result<PipelineReport, PipelineError> {
        self.config.validate().map_err(at(Stage::Setup))?;
        validate_targets(&self.targets).map_err(at(Stage::Setup))?;

        let plan = resolve(event, today).map_err(at(Stage::Resolve))?;
        emit_pipeline_started(run_id, &plan.tag_name, self.targets.len());

        let artifacts = run_all(
            self.targets.clone(),
            &self.config.build_root(),
            self.config.max_parallel,
            &self.cancel,
            Arc::clone(&self.builder),
        )
        .await
        .map_err(at(Stage::Build))?;

        let dist = self.config.dist_dir();
        let set = clear_dir(&dist)
            .and_then(|()| aggregate(artifacts, &dist))
            .map_err(at(Stage::Aggregate))?;

        let manifest = compute_manifest(&set).map_err(at(Stage::Checksum))?;
        let manifest_path = write_manifest(&manifest, &dist, &self.config.manifest_name)
            .map_err(at(Stage::Checksum))?;

        self.ensure_not_cancelled(Stage::Tag)?;
        let tag = ensure_tag(&plan, self.tags.as_ref())
            .await
            .map_err(at(Stage::Tag))?;

        self.ensure_not_cancelled(Stage::Publish)?;
        let release = self
            .publisher
            .publish(&plan, &set, &manifest_path)
            .await
            .map_err(at(Stage::Publish))?;

        info!(
            tag = %release.tag_name,
            files = release.attached_files.len(),
            "Release complete"
        );

        Ok(PipelineReport {
            run_id: run_id.to_string(),
            plan,
            tag,
            manifest_path,
            release,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn ensure_not_cancelled(&self, stage: Stage) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            return Err(PipelineError::new(stage, ReleaseError::Cancelled { stage }));
        }
        Ok(())
    }
}

fn at(stage: Stage) -> impl FnOnce(ReleaseError) -> PipelineError {
    move |err| PipelineError::new(stage, err)
}

/// Aggregation needs an empty destination; leftovers from an earlier run are removed.
fn clear_dir(dir: &std::path::Path) -> ReleaseResult<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
    }
    Ok(())
}
