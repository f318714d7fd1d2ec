//! Workspace compilation
//!
//! Two-phase build: "cook" pre-compiles the dependencies described by the
//! recipe alone, then the full source overlays it and the workspace compiles
//! in release mode. Both phases share the target cache volume, so the cook
//! output is reused whenever the recipe is unchanged.

use crate::cache::CacheVolume;
use crate::error::{PipelineError, PipelineResult};
use crate::runtime::{ContainerRuntime, ExecSpec};
use crate::sccache::Provisioner;
use crate::snapshot::SourceSnapshot;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::recipe::Recipe;

/// The executables this pipeline produces, in copy-out order
pub const ARTIFACT_NAMES: [&str; 5] = [
    "dbost-jobs-db-cleanup",
    "dbost-jobs-precompress",
    "dbost-migration",
    "dbost",
    "dbost-jobs-deploy",
];

/// One compiled executable, immutable once produced
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Executable name
    pub name: &'static str,
    /// Host path of the binary
    pub path: PathBuf,
}

/// Compiles the workspace into the fixed artifact set
pub struct CompileStage<'a> {
    snapshot: &'a SourceSnapshot,
    work_dir: &'a Path,
    rust_image: &'a str,
    target_volume: &'a CacheVolume,
    cargo_volume: &'a CacheVolume,
    provisioner: &'a Provisioner,
    version: &'a str,
}

impl<'a> CompileStage<'a> {
    /// Create a compile stage
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        snapshot: &'a SourceSnapshot,
        work_dir: &'a Path,
        rust_image: &'a str,
        target_volume: &'a CacheVolume,
        cargo_volume: &'a CacheVolume,
        provisioner: &'a Provisioner,
        version: &'a str,
    ) -> Self {
        Self {
            snapshot,
            work_dir,
            rust_image,
            target_volume,
            cargo_volume,
            provisioner,
            version,
        }
    }

    /// The staged full-source directory, shared with the verify stage
    pub fn source_dir(&self) -> PathBuf {
        self.work_dir.join("src")
    }

    /// Cook the recipe, compile the workspace, and copy out the artifacts
    pub async fn compile(
        &self,
        runtime: &dyn ContainerRuntime,
        recipe: &Recipe,
    ) -> PipelineResult<Vec<Artifact>> {
        let target_mount = self.target_volume.ensure(runtime).await?;
        let cargo_mount = self.cargo_volume.ensure(runtime).await?;

        // Phase 1: dependencies only, keyed by the recipe
        let cook_dir = self.work_dir.join("cook");
        fs::create_dir_all(&cook_dir)
            .map_err(|e| PipelineError::io(format!("creating {}", cook_dir.display()), e))?;
        fs::copy(&recipe.path, cook_dir.join("recipe.json"))
            .map_err(|e| PipelineError::io("staging recipe.json", e))?;

        debug!("Cooking dependencies (recipe {})", recipe.digest);
        let cook = self.provisioner.install(
            ExecSpec::new(self.rust_image, "/work")
                .with_bind(&cook_dir, "/work", false)
                .with_volume(target_mount.name.clone(), target_mount.container.clone())
                .with_volume(cargo_mount.name.clone(), cargo_mount.container.clone())
                .with_env("CARGO_HOME", "/cache/cargo")
                .with_shell(
                    "export PATH=\"/cache/cargo/bin:$PATH\"; \
                     cargo chef cook --release --recipe-path recipe.json",
                ),
        );
        let output = runtime.exec(&cook).await?;
        if !output.success() {
            return Err(PipelineError::CompileFailed(output.combined()));
        }

        // Phase 2: full source overlay, release build
        let src_dir = self.source_dir();
        fs::create_dir_all(&src_dir)
            .map_err(|e| PipelineError::io(format!("creating {}", src_dir.display()), e))?;
        let staged = self.snapshot.stage_full_view(&src_dir)?;
        debug!("Staged {staged} source files for release build");

        let build = self.provisioner.install(
            ExecSpec::new(self.rust_image, "/work")
                .with_bind(&src_dir, "/work", false)
                .with_volume(target_mount.name.clone(), target_mount.container.clone())
                .with_volume(cargo_mount.name.clone(), cargo_mount.container.clone())
                .with_env("CARGO_HOME", "/cache/cargo")
                .with_env("GIT_SHA", self.version)
                .with_shell("cargo build --release --workspace"),
        );
        let output = runtime.exec(&build).await?;
        if !output.success() {
            return Err(PipelineError::CompileFailed(output.combined()));
        }

        // Copy the binaries out of the target volume
        let bin_dir = self.work_dir.join("bin");
        fs::create_dir_all(&bin_dir)
            .map_err(|e| PipelineError::io(format!("creating {}", bin_dir.display()), e))?;

        let copy_script = format!(
            "cp {} /out/",
            ARTIFACT_NAMES
                .iter()
                .map(|n| format!("target/release/{n}"))
                .collect::<Vec<_>>()
                .join(" ")
        );
        let copy_out = ExecSpec::new(self.rust_image, "/work")
            .with_bind(&src_dir, "/work", false)
            .with_bind(&bin_dir, "/out", false)
            .with_volume(target_mount.name.clone(), target_mount.container.clone())
            .with_shell(copy_script);
        runtime
            .exec(&copy_out)
            .await?
            .require_success("copying release binaries")?;

        let artifacts = collect_artifacts(&bin_dir)?;
        info!("Compiled {} artifacts", artifacts.len());
        Ok(artifacts)
    }
}

/// Gather the fixed artifact set from the copy-out directory.
///
/// All five executables must be present; a partial set is treated as a
/// failed compilation and yields no artifacts.
pub(crate) fn collect_artifacts(bin_dir: &Path) -> PipelineResult<Vec<Artifact>> {
    let mut artifacts = Vec::with_capacity(ARTIFACT_NAMES.len());

    for name in ARTIFACT_NAMES {
        let path = bin_dir.join(name);
        if !path.is_file() {
            return Err(PipelineError::ArtifactMissing(name.to_string()));
        }
        artifacts.push(Artifact { name, path });
    }

    Ok(artifacts)
}

/// Look up an artifact by name
pub fn find_artifact<'a>(artifacts: &'a [Artifact], name: &str) -> PipelineResult<&'a Artifact> {
    artifacts
        .iter()
        .find(|a| a.name == name)
        .ok_or_else(|| PipelineError::ArtifactMissing(name.to_string()))
}
