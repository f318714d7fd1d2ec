//! Container runtime abstraction
//!
//! Provides a trait for the container operations the pipeline needs: one-shot
//! stage execution, image build/tag/push, and cache volume management. The
//! production implementation drives the Docker CLI; tests substitute a
//! recording mock.

use crate::error::{PipelineError, PipelineResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// A host directory mounted into a stage container
#[derive(Debug, Clone)]
pub struct BindMount {
    /// Host path
    pub host: PathBuf,
    /// Mount path inside the container
    pub container: String,
    /// Whether to mount read-only
    pub readonly: bool,
}

impl BindMount {
    /// Generate the mount string for the Docker CLI
    pub fn mount_arg(&self) -> String {
        let ro = if self.readonly { ":ro" } else { "" };
        format!("{}:{}{}", self.host.display(), self.container, ro)
    }
}

/// A named cache volume mounted into a stage container
#[derive(Debug, Clone)]
pub struct VolumeMount {
    /// Volume name
    pub name: String,
    /// Mount path inside the container
    pub container: String,
}

impl VolumeMount {
    /// Generate the mount string for the Docker CLI
    pub fn mount_arg(&self) -> String {
        format!("{}:{}", self.name, self.container)
    }
}

/// Specification for one stage execution: a single container run with
/// declared inputs, awaited to completion with captured output.
#[derive(Debug, Clone)]
pub struct ExecSpec {
    /// Container image to run in
    pub image: String,
    /// Working directory inside the container
    pub workdir: String,
    /// Host directory mounts
    pub binds: Vec<BindMount>,
    /// Named cache volume mounts
    pub volumes: Vec<VolumeMount>,
    /// Environment variables (sorted for deterministic argv)
    pub env: BTreeMap<String, String>,
    /// Command to run
    pub command: Vec<String>,
}

impl ExecSpec {
    /// Create a spec running in `image` at `workdir`
    pub fn new(image: impl Into<String>, workdir: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            workdir: workdir.into(),
            binds: Vec::new(),
            volumes: Vec::new(),
            env: BTreeMap::new(),
            command: Vec::new(),
        }
    }

    /// Add a host directory mount
    pub fn with_bind(
        mut self,
        host: impl Into<PathBuf>,
        container: impl Into<String>,
        readonly: bool,
    ) -> Self {
        self.binds.push(BindMount {
            host: host.into(),
            container: container.into(),
            readonly,
        });
        self
    }

    /// Add a named volume mount
    pub fn with_volume(mut self, name: impl Into<String>, container: impl Into<String>) -> Self {
        self.volumes.push(VolumeMount {
            name: name.into(),
            container: container.into(),
        });
        self
    }

    /// Set an environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the command
    pub fn with_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    /// Set the command to a shell script
    pub fn with_shell(self, script: impl Into<String>) -> Self {
        self.with_command(["bash".to_string(), "-c".to_string(), script.into()])
    }
}

/// Captured result of a stage execution
#[derive(Debug, Clone)]
pub struct ExecOutput {
    /// Process exit code (-1 if terminated by signal)
    pub exit_code: i32,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
}

impl ExecOutput {
    /// Whether the stage exited cleanly
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout and stderr joined for diagnostics
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }

    /// Error out with captured stderr unless the stage exited cleanly
    pub fn require_success(&self, command: impl Into<String>) -> PipelineResult<()> {
        if self.success() {
            Ok(())
        } else {
            Err(PipelineError::command_exec(command, self.combined()))
        }
    }
}

/// Specification for building one image from a staged context
#[derive(Debug, Clone)]
pub struct ImageBuild {
    /// Local tag for the built image
    pub tag: String,
    /// Build context directory
    pub context: PathBuf,
    /// Dockerfile path within or outside the context
    pub dockerfile: PathBuf,
}

/// Information about a volume
#[derive(Debug, Clone)]
pub struct VolumeInfo {
    /// Volume name
    pub name: String,
    /// Volume labels
    pub labels: HashMap<String, String>,
}

/// Abstract container runtime interface
///
/// The pipeline issues operations in dependency order and only observes
/// completion; every call is awaited and returns captured results.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Check if the runtime is available on this system
    async fn is_available(&self) -> PipelineResult<bool>;

    /// Ensure the runtime is ready (daemon reachable)
    async fn ensure_ready(&self) -> PipelineResult<()>;

    /// Run one stage container to completion, capturing output
    async fn exec(&self, spec: &ExecSpec) -> PipelineResult<ExecOutput>;

    /// Build an image from a staged context
    async fn build_image(&self, build: &ImageBuild) -> PipelineResult<()>;

    /// Apply an additional reference to a local image
    async fn tag_image(&self, source: &str, reference: &str) -> PipelineResult<()>;

    /// Push a reference to its registry
    async fn push_image(&self, reference: &str) -> PipelineResult<()>;

    /// Inspect a volume, returning None if it does not exist
    async fn volume_inspect(&self, name: &str) -> PipelineResult<Option<VolumeInfo>>;

    /// Create a labeled volume
    async fn volume_create(
        &self,
        name: &str,
        labels: &HashMap<String, String>,
    ) -> PipelineResult<()>;

    /// List volumes whose name starts with `prefix`
    async fn volume_list(&self, prefix: &str) -> PipelineResult<Vec<VolumeInfo>>;

    /// Remove a volume
    async fn volume_remove(&self, name: &str) -> PipelineResult<()>;

    /// Human-readable runtime name for display
    fn runtime_name(&self) -> &'static str;
}
