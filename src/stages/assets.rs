//! Frontend asset bundle build
//!
//! Installs the frontend toolchain, restores dependencies strictly from the
//! lock file, runs the bundler, then precompresses the output in place with
//! the compiled precompressor artifact. Must complete before the bundle is
//! baked into the web image.

use crate::cache::CacheVolume;
use crate::error::{PipelineError, PipelineResult};
use crate::runtime::{ContainerRuntime, ExecSpec};
use crate::stages::compile::Artifact;
use std::path::{Path, PathBuf};
use tracing::info;

/// Mount path of the precompressor inside its container
const PRECOMPRESS_PATH: &str = "/usr/local/bin/dbost-jobs-precompress";

/// The built, precompressed static asset bundle
#[derive(Debug, Clone)]
pub struct AssetBundle {
    /// Host path of the bundle directory
    pub dir: PathBuf,
}

/// Builds and post-processes the static asset bundle
pub struct AssetBuildStage<'a> {
    source_dir: &'a Path,
    node_image: &'a str,
    runtime_image: &'a str,
    pnpm_volume: &'a CacheVolume,
    precompressor: &'a Artifact,
}

impl<'a> AssetBuildStage<'a> {
    /// Create an asset build stage over the staged full source
    pub fn new(
        source_dir: &'a Path,
        node_image: &'a str,
        runtime_image: &'a str,
        pnpm_volume: &'a CacheVolume,
        precompressor: &'a Artifact,
    ) -> Self {
        Self {
            source_dir,
            node_image,
            runtime_image,
            pnpm_volume,
            precompressor,
        }
    }

    /// Install dependencies, run the bundler, precompress the output
    pub async fn build(&self, runtime: &dyn ContainerRuntime) -> PipelineResult<AssetBundle> {
        let pnpm_mount = self.pnpm_volume.ensure(runtime).await?;

        info!("Building asset bundle");
        let mut bundle = ExecSpec::new(self.node_image, "/work")
            .with_bind(self.source_dir, "/work", false)
            .with_volume(pnpm_mount.name.clone(), pnpm_mount.container.clone())
            .with_shell(
                "corepack enable pnpm \
                 && pnpm install --frozen-lockfile \
                 && pnpm build",
            );
        for (key, value) in self.pnpm_volume.kind.env_vars() {
            bundle = bundle.with_env(*key, *value);
        }

        let output = runtime.exec(&bundle).await?;
        if !output.success() {
            return Err(PipelineError::AssetBuildFailed(output.combined()));
        }

        let dist = self.source_dir.join("dist");
        if !dist.is_dir() {
            return Err(PipelineError::AssetBuildFailed(
                "bundler produced no dist directory".to_string(),
            ));
        }

        info!("Precompressing asset bundle");
        let precompress = ExecSpec::new(self.runtime_image, "/work")
            .with_bind(&self.precompressor.path, PRECOMPRESS_PATH, true)
            .with_bind(&dist, "/work/dist", false)
            .with_env("DIR", "/work/dist")
            .with_command([PRECOMPRESS_PATH]);

        let output = runtime.exec(&precompress).await?;
        if !output.success() {
            return Err(PipelineError::AssetBuildFailed(output.combined()));
        }

        Ok(AssetBundle { dir: dist })
    }
}
