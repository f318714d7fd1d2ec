//! Pipeline orchestration
//!
//! Drives the stages in dependency order: source snapshot and cache
//! provisioner first, then recipe → compile → verify → assets → image
//! assembly → publish coordination. Verification is a hard gate: the
//! coordinator never runs when tests or lint fail. Any stage failure aborts
//! the run with nothing published.

use crate::cache::{CacheKind, CacheVolume};
use crate::config::{Config, ConfigManager};
use crate::error::{PipelineError, PipelineResult};
use crate::runtime::ContainerRuntime;
use crate::sccache::Provisioner;
use crate::snapshot::SourceSnapshot;
use crate::stages::{
    compile::find_artifact, AssetBuildStage, CompileStage, ImageAssembler, PublishCoordinator,
    PublishOutcome, RecipeBuilder, VerifyReport, VerifyStage,
};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

/// Options for one pipeline run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Repository root to build
    pub project_dir: PathBuf,
    /// Publish mode: push every image under every tag when true
    pub publish: bool,
    /// Resolved release version
    pub version: String,
}

/// Everything a completed run reports
#[derive(Debug)]
pub struct RunSummary {
    /// Run identifier (names the scratch directory)
    pub run_id: Uuid,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration
    pub duration: Duration,
    /// Captured test and lint output
    pub verify: VerifyReport,
    /// Compiler cache statistics, when the remote cache was active
    pub cache_stats: Option<String>,
    /// Publish or dry-run result
    pub outcome: PublishOutcome,
}

/// Scratch directory layout for one run
#[derive(Debug)]
pub struct RunWorkspace {
    /// Run identifier
    pub run_id: Uuid,
    /// Scratch root for this run
    pub root: PathBuf,
}

impl RunWorkspace {
    /// Allocate a fresh scratch directory under the state dir
    pub fn create() -> PipelineResult<Self> {
        let run_id = Uuid::new_v4();
        let root = ConfigManager::runs_dir().join(run_id.to_string());
        Self::create_at(run_id, root)
    }

    /// Allocate a workspace at an explicit root (used by tests)
    pub fn create_at(run_id: Uuid, root: PathBuf) -> PipelineResult<Self> {
        for dir in [root.clone(), root.join("sccache")] {
            fs::create_dir_all(&dir)
                .map_err(|e| PipelineError::io(format!("creating {}", dir.display()), e))?;
        }
        Ok(Self { run_id, root })
    }

    /// Scratch area for the downloaded compiler cache tool
    pub fn sccache_dir(&self) -> PathBuf {
        self.root.join("sccache")
    }
}

/// Number of reported stages in a full run
pub const STAGE_COUNT: u64 = 8;

/// Execute the full pipeline.
///
/// `on_stage` is invoked with a short description as each stage begins;
/// the run command uses it to drive progress output.
pub async fn run(
    options: &RunOptions,
    config: &Config,
    runtime: &dyn ContainerRuntime,
    on_stage: &mut dyn FnMut(&str),
) -> PipelineResult<RunSummary> {
    let started_at = Utc::now();
    let clock = Instant::now();

    let snapshot = SourceSnapshot::new(&options.project_dir)?;
    let workspace = RunWorkspace::create()?;
    info!(
        run_id = %workspace.run_id,
        project = %snapshot.root().display(),
        version = %options.version,
        publish = options.publish,
        "Pipeline run starting"
    );

    // Explicit provisioner initialization: active only with credentials and
    // a resolvable, checksum-verified tool. Blocking work off the runtime.
    on_stage("Provisioning compile cache");
    let sccache_dir = workspace.sccache_dir();
    let provisioner = tokio::task::spawn_blocking(move || Provisioner::init(&sccache_dir))
        .await
        .map_err(|e| PipelineError::Internal(format!("provisioner task failed: {e}")))??;
    debug!(active = provisioner.is_active(), "Compile cache provisioner ready");

    let target_volume = CacheVolume::new(&config.volumes.target, CacheKind::Target);
    let cargo_volume = CacheVolume::new(&config.volumes.cargo, CacheKind::Cargo);
    let pnpm_volume = CacheVolume::new(&config.volumes.pnpm, CacheKind::Pnpm);

    on_stage("Preparing dependency recipe");
    let recipe = RecipeBuilder::new(
        &snapshot,
        &workspace.root,
        &config.builder.rust_image,
        &cargo_volume,
    )
    .prepare(runtime)
    .await?;

    on_stage("Compiling workspace");
    let compile = CompileStage::new(
        &snapshot,
        &workspace.root,
        &config.builder.rust_image,
        &target_volume,
        &cargo_volume,
        &provisioner,
        &options.version,
    );
    let artifacts = compile.compile(runtime, &recipe).await?;
    let source_dir = compile.source_dir();

    // Hard gate: no image is evaluated or published past a failed verify
    on_stage("Verifying workspace (tests + lint)");
    let verify = VerifyStage::new(
        &source_dir,
        &config.builder.rust_image,
        &target_volume,
        &cargo_volume,
        &provisioner,
    )
    .verify(runtime)
    .await?;

    on_stage("Building asset bundle");
    let precompressor = find_artifact(&artifacts, "dbost-jobs-precompress")?;
    let bundle = AssetBuildStage::new(
        &source_dir,
        &config.builder.node_image,
        &config.builder.runtime_image,
        &pnpm_volume,
        precompressor,
    )
    .build(runtime)
    .await?;

    on_stage("Assembling images");
    let plan = ImageAssembler::new(config, &artifacts, &bundle, &workspace.root).prepare()?;

    on_stage(if options.publish {
        "Publishing images"
    } else {
        "Evaluating images (dry run)"
    });
    let coordinator = PublishCoordinator::new(options.publish, &options.version);
    let outcome = coordinator.execute(runtime, &plan).await?;

    on_stage("Collecting cache statistics");
    let cache_stats = provisioner
        .stats(runtime, &config.builder.rust_image)
        .await?;

    Ok(RunSummary {
        run_id: workspace.run_id,
        started_at,
        duration: clock.elapsed(),
        verify,
        cache_stats,
        outcome,
    })
}

/// Check that the project looks buildable before starting a run
pub fn preflight(project_dir: &Path) -> PipelineResult<SourceSnapshot> {
    let snapshot = SourceSnapshot::new(project_dir)?;

    if !snapshot.root().join("package.json").is_file() {
        return Err(PipelineError::ProjectLayout {
            path: snapshot.root().to_path_buf(),
            reason: "no package.json for the asset bundle stage".to_string(),
        });
    }

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn workspace_creates_scratch_layout() {
        let temp = TempDir::new().unwrap();
        let run_id = Uuid::new_v4();
        let workspace =
            RunWorkspace::create_at(run_id, temp.path().join(run_id.to_string())).unwrap();

        assert!(workspace.root.is_dir());
        assert!(workspace.sccache_dir().is_dir());
        assert_eq!(workspace.run_id, run_id);
    }

    #[test]
    fn preflight_requires_frontend_manifest() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("Cargo.toml"), "[workspace]\n").unwrap();

        let err = preflight(temp.path()).unwrap_err();
        assert!(matches!(err, PipelineError::ProjectLayout { .. }));

        std::fs::write(temp.path().join("package.json"), "{}").unwrap();
        assert!(preflight(temp.path()).is_ok());
    }
}
