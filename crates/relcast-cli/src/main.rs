//! relcast - release orchestration CLI
//!
//! Turns a tag push or a manual dispatch into one versioned, multi-platform
//! release with a checksum manifest.
//!
//! ## Commands
//!
//! - `plan`: resolve a trigger into a release plan
//! - `targets`: list the effective build targets
//! - `manifest`: checksum the archives in a directory
//! - `verify`: check a manifest against the files beside it
//! - `run`: build, tag and publish

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn, Level};

use relcast_ci::{default_targets, load_targets, toolchain_builder, ReleasePipeline};
use relcast_core::{
    capture_head_sha, compute_manifest, resolve, verify_manifest, write_manifest,
    AggregatedArtifactSet, BuildTarget, CancelSignal, ChecksumManifest, ContentDigest,
    GitTagRegistry, GithubReleaseHost, MemoryReleaseHost, MemoryTagRegistry, PipelineConfig,
    ReleaseHost, ReleaseType, TagRegistry, TriggerEvent, VerifyOutcome, VerifyStatus,
    DEFAULT_MANIFEST_NAME,
};

#[derive(Parser)]
#[command(name = "relcast")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Release orchestration: one trigger in, one multi-platform release out", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where the trigger comes from. Exactly one source is required.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
struct TriggerArgs {
    /// Pushed tag ref, e.g. refs/tags/v1.2.3
    #[arg(long)]
    tag: Option<String>,

    /// Manual dispatch release type (nightly or test)
    #[arg(long)]
    dispatch: Option<ReleaseType>,

    /// Read the trigger from GITHUB_EVENT_NAME / GITHUB_REF / RELCAST_RELEASE_TYPE
    #[arg(long)]
    from_env: bool,
}

impl TriggerArgs {
    fn to_event(&self) -> Result<TriggerEvent> {
        if let Some(tag) = &self.tag {
            return Ok(TriggerEvent::tag_push(tag.as_str()));
        }
        if let Some(release_type) = self.dispatch {
            return Ok(TriggerEvent::manual(release_type));
        }
        TriggerEvent::from_env().context("Failed to read trigger from environment")
    }
}

#[derive(Args, Debug, Clone)]
struct TargetArgs {
    /// Binary produced by the toolchain
    #[arg(long, env = "RELCAST_BINARY", default_value = "relcast")]
    binary: String,

    /// JSON file with build targets (default: builtin platforms)
    #[arg(long, env = "RELCAST_TARGETS")]
    targets: Option<PathBuf>,
}

impl TargetArgs {
    fn load(&self) -> Result<Vec<BuildTarget>> {
        match &self.targets {
            Some(path) => load_targets(path)
                .with_context(|| format!("Failed to load targets from {}", path.display())),
            None => Ok(default_targets(&self.binary)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a trigger and print the release plan as JSON
    Plan {
        #[command(flatten)]
        trigger: TriggerArgs,

        /// Date used for dispatch versions (default: today, UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// List the effective build targets
    Targets {
        #[command(flatten)]
        targets: TargetArgs,
    },

    /// Compute the checksum manifest for the archives in a directory
    Manifest {
        /// Directory holding the archives
        dir: PathBuf,

        /// Manifest file name (excluded from hashing)
        #[arg(long, default_value = DEFAULT_MANIFEST_NAME)]
        name: String,

        /// Write the manifest into the directory instead of printing it
        #[arg(long)]
        write: bool,
    },

    /// Verify a manifest against the files beside it
    Verify {
        /// Path to the manifest file
        manifest: PathBuf,
    },

    /// Build every target, tag if needed, and publish the release
    Run {
        #[command(flatten)]
        trigger: TriggerArgs,

        #[command(flatten)]
        targets: TargetArgs,

        /// Source checkout to build (overrides RELCAST_WORKSPACE)
        #[arg(long)]
        workspace: Option<PathBuf>,

        /// Staging root (overrides RELCAST_STAGING_DIR)
        #[arg(long)]
        staging_dir: Option<PathBuf>,

        /// Date used for dispatch versions (default: today, UTC)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Build for real but tag and publish into memory only
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    relcast_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Plan { trigger, date } => cmd_plan(&trigger, date),
        Commands::Targets { targets } => cmd_targets(&targets),
        Commands::Manifest { dir, name, write } => cmd_manifest(&dir, &name, write),
        Commands::Verify { manifest } => cmd_verify(&manifest),
        Commands::Run {
            trigger,
            targets,
            workspace,
            staging_dir,
            date,
            dry_run,
        } => cmd_run(&trigger, &targets, workspace, staging_dir, date, dry_run).await,
    }
}

fn today_or(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| Utc::now().date_naive())
}

fn cmd_plan(trigger: &TriggerArgs, date: Option<NaiveDate>) -> Result<()> {
    let event = trigger.to_event()?;
    let plan = resolve(&event, today_or(date)).context("Failed to resolve trigger")?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

fn cmd_targets(args: &TargetArgs) -> Result<()> {
    let targets = args.load()?;
    for target in &targets {
        println!(
            "{:<16} {:<28} {}",
            target.platform_id, target.toolchain_triple, target.archive_name
        );
    }
    Ok(())
}

fn manifest_for_dir(dir: &Path, name: &str) -> Result<ChecksumManifest> {
    let set = AggregatedArtifactSet::from_dir(dir, &[name])
        .with_context(|| format!("Failed to read archives in {}", dir.display()))?;
    if set.is_empty() {
        anyhow::bail!("No archives found in {}", dir.display());
    }
    Ok(compute_manifest(&set)?)
}

fn cmd_manifest(dir: &Path, name: &str, write: bool) -> Result<()> {
    let manifest = manifest_for_dir(dir, name)?;
    if write {
        let path = write_manifest(&manifest, dir, name)?;
        println!("Wrote {} ({} entries)", path.display(), manifest.len());
    } else {
        print!("{}", manifest.render());
    }
    Ok(())
}

fn cmd_verify(manifest_path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(manifest_path)
        .with_context(|| format!("Failed to read {}", manifest_path.display()))?;
    let manifest = ChecksumManifest::parse(&text)?;
    let dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));

    let outcomes = verify_manifest(&manifest, dir)?;
    let mut failed = 0;
    for outcome in &outcomes {
        if outcome.status != VerifyStatus::Ok {
            failed += 1;
        }
        println!("{}", verify_line(outcome, &manifest));
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} entries did not verify", outcomes.len());
    }
    Ok(())
}

/// `sha256sum -c` style line, with short digests on a mismatch.
fn verify_line(outcome: &VerifyOutcome, manifest: &ChecksumManifest) -> String {
    match &outcome.status {
        VerifyStatus::Ok => format!("{}: OK", outcome.archive_name),
        VerifyStatus::Missing => format!("{}: MISSING", outcome.archive_name),
        VerifyStatus::Mismatch { actual } => {
            let expected = manifest
                .digest_of(&outcome.archive_name)
                .map(|d| d.short().to_string())
                .unwrap_or_default();
            let actual = ContentDigest::try_from(actual.clone())
                .map(|d| d.short().to_string())
                .unwrap_or_else(|_| actual.clone());
            format!(
                "{}: FAILED (expected {expected}, got {actual})",
                outcome.archive_name
            )
        }
    }
}

async fn cmd_run(
    trigger: &TriggerArgs,
    target_args: &TargetArgs,
    workspace: Option<PathBuf>,
    staging_dir: Option<PathBuf>,
    date: Option<NaiveDate>,
    dry_run: bool,
) -> Result<()> {
    let event = trigger.to_event()?;
    let today = today_or(date);

    let mut config = PipelineConfig::from_env()?;
    if let Some(dir) = workspace {
        config = config.with_workspace(dir);
    }
    if let Some(dir) = staging_dir {
        config = config.with_staging_dir(dir);
    }
    let targets = target_args.load()?;
    let workspace = config.workspace_dir.clone();

    let (tags, host): (Arc<dyn TagRegistry>, Arc<dyn ReleaseHost>) = if dry_run {
        let head = capture_head_sha(&workspace).unwrap_or_else(|e| {
            warn!(error = %e, "No git HEAD, dry run tags will point at a placeholder");
            "0".repeat(40)
        });
        let mut registry = MemoryTagRegistry::new(&head);
        // A tag push means the tag already exists upstream.
        let plan = resolve(&event, today)?;
        if !plan.requires_tag_creation {
            registry = registry.with_tag(&plan.tag_name);
        }
        (Arc::new(registry), Arc::new(MemoryReleaseHost::new()))
    } else {
        let registry = GitTagRegistry::new(&workspace, config.remote.clone())
            .context("Failed to open git repository")?;
        let host = GithubReleaseHost::from_env().context("Failed to configure GitHub client")?;
        (Arc::new(registry), Arc::new(host))
    };

    let cancel = CancelSignal::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling release");
            on_interrupt.cancel();
        }
    });

    println!("Running release pipeline for workspace: {}", workspace.display());
    println!("Targets: {}", targets.len());
    if dry_run {
        println!("Mode: dry run (nothing is tagged or published)");
    }
    println!();

    let builder = toolchain_builder(config.workspace_dir.clone());
    let pipeline =
        ReleasePipeline::new(config, targets, builder, tags, host).with_cancel(cancel);
    let report = pipeline
        .run(&event, today)
        .await
        .context("Release pipeline failed")?;

    info!(run_id = %report.run_id, "Pipeline finished");
    println!("Run ID: {}", report.run_id);
    println!(
        "Release: {} ({})",
        report.release.display_name, report.release.tag_name
    );
    println!("Pre-release: {}", report.release.is_prerelease);
    if let Some(url) = &report.release.html_url {
        println!("URL: {url}");
    }
    println!("Duration: {}ms", report.duration_ms);
    println!();
    for file in &report.release.attached_files {
        println!("  ✓ {} ({} bytes)", file.name, file.size_bytes);
    }
    Ok(())
}
