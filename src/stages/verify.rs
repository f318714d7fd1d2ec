//! Test and lint verification
//!
//! Runs the full test suite and a strict clippy pass against the compiled
//! workspace, reusing the compile caches. Verification is a hard gate: a
//! non-zero exit from either step aborts the run before any image is
//! evaluated or published. The captured output is carried in the report so
//! the run command can print it for inspection.

use crate::cache::CacheVolume;
use crate::error::{PipelineError, PipelineResult};
use crate::runtime::{ContainerRuntime, ExecSpec};
use crate::sccache::Provisioner;
use std::path::Path;
use tracing::info;

/// Captured verification output
#[derive(Debug, Clone)]
pub struct VerifyReport {
    /// Full test suite output
    pub test_output: String,
    /// Clippy output (warnings escalated to errors)
    pub lint_output: String,
}

/// Runs tests and lint against the staged workspace
pub struct VerifyStage<'a> {
    source_dir: &'a Path,
    rust_image: &'a str,
    target_volume: &'a CacheVolume,
    cargo_volume: &'a CacheVolume,
    provisioner: &'a Provisioner,
}

impl<'a> VerifyStage<'a> {
    /// Create a verify stage over the compile stage's staged source
    pub fn new(
        source_dir: &'a Path,
        rust_image: &'a str,
        target_volume: &'a CacheVolume,
        cargo_volume: &'a CacheVolume,
        provisioner: &'a Provisioner,
    ) -> Self {
        Self {
            source_dir,
            rust_image,
            target_volume,
            cargo_volume,
            provisioner,
        }
    }

    fn spec(&self, script: &str) -> ExecSpec {
        self.provisioner.install(
            ExecSpec::new(self.rust_image, "/work")
                .with_bind(self.source_dir, "/work", false)
                .with_volume(
                    self.target_volume.name.clone(),
                    self.target_volume.kind.mount_path(),
                )
                .with_volume(
                    self.cargo_volume.name.clone(),
                    self.cargo_volume.kind.mount_path(),
                )
                .with_env("CARGO_HOME", "/cache/cargo")
                .with_shell(script),
        )
    }

    /// Run tests then lint, failing hard on either
    pub async fn verify(&self, runtime: &dyn ContainerRuntime) -> PipelineResult<VerifyReport> {
        info!("Running test suite");
        let tests = runtime
            .exec(&self.spec("cargo test --release --workspace"))
            .await?;
        if !tests.success() {
            return Err(PipelineError::TestsFailed {
                output: tests.combined(),
            });
        }

        info!("Running lint pass");
        let lint = runtime
            .exec(&self.spec(
                "cargo clippy --release --workspace --all-targets -- -D warnings",
            ))
            .await?;
        if !lint.success() {
            return Err(PipelineError::LintFailed {
                output: lint.combined(),
            });
        }

        Ok(VerifyReport {
            test_output: tests.combined(),
            lint_output: lint.combined(),
        })
    }
}
