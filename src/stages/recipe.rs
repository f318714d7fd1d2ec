//! Dependency recipe preparation
//!
//! Produces the serialized dependency recipe from manifests and entry points
//! alone. The recipe is the cache key for dependency compilation: unrelated
//! source edits leave it byte-identical, so the cook phase stays cache-warm.

use crate::cache::CacheVolume;
use crate::error::{PipelineError, PipelineResult};
use crate::runtime::{ContainerRuntime, ExecSpec};
use crate::snapshot::{hash_file_contents, SourceSnapshot};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A prepared dependency recipe
#[derive(Debug, Clone)]
pub struct Recipe {
    /// Host path of the serialized recipe
    pub path: PathBuf,
    /// Content digest, for logging and cache diagnostics
    pub digest: String,
}

/// Builds the dependency recipe from a source snapshot
pub struct RecipeBuilder<'a> {
    snapshot: &'a SourceSnapshot,
    work_dir: &'a Path,
    rust_image: &'a str,
    cargo_volume: &'a CacheVolume,
}

impl<'a> RecipeBuilder<'a> {
    /// Create a recipe builder
    pub fn new(
        snapshot: &'a SourceSnapshot,
        work_dir: &'a Path,
        rust_image: &'a str,
        cargo_volume: &'a CacheVolume,
    ) -> Self {
        Self {
            snapshot,
            work_dir,
            rust_image,
            cargo_volume,
        }
    }

    /// Stage the recipe view and run the dependency planner over it
    pub async fn prepare(&self, runtime: &dyn ContainerRuntime) -> PipelineResult<Recipe> {
        let view = self.work_dir.join("recipe-src");
        fs::create_dir_all(&view)
            .map_err(|e| PipelineError::io(format!("creating {}", view.display()), e))?;

        let staged = self.snapshot.stage_recipe_view(&view)?;
        debug!("Staged {staged} manifest/entry-point files for recipe");

        let cargo_mount = self.cargo_volume.ensure(runtime).await?;

        // cargo-chef persists in the cargo-home volume after the first run
        let ensure_chef = ExecSpec::new(self.rust_image, "/work")
            .with_volume(cargo_mount.name.clone(), cargo_mount.container.clone())
            .with_env("CARGO_HOME", "/cache/cargo")
            .with_shell(
                "export PATH=\"/cache/cargo/bin:$PATH\"; \
                 command -v cargo-chef >/dev/null 2>&1 || cargo install cargo-chef --locked",
            );
        runtime
            .exec(&ensure_chef)
            .await?
            .require_success("cargo install cargo-chef")?;

        let prepare = ExecSpec::new(self.rust_image, "/work")
            .with_bind(&view, "/work", false)
            .with_volume(cargo_mount.name.clone(), cargo_mount.container.clone())
            .with_env("CARGO_HOME", "/cache/cargo")
            .with_shell(
                "export PATH=\"/cache/cargo/bin:$PATH\"; \
                 cargo chef prepare --recipe-path recipe.json",
            );

        let output = runtime.exec(&prepare).await?;
        if !output.success() {
            return Err(PipelineError::RecipeFailed(output.combined()));
        }

        let path = view.join("recipe.json");
        if !path.is_file() {
            return Err(PipelineError::RecipeFailed(
                "planner produced no recipe.json".to_string(),
            ));
        }

        let digest = hash_file_contents(&path)?;
        info!("Dependency recipe ready (digest {digest})");

        Ok(Recipe { path, digest })
    }
}
