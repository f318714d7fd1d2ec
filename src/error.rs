//! Error types for the pipeline
//!
//! All modules use `PipelineResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// All errors that can occur in the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    // Environment errors
    #[error("Docker not found. Install from https://docs.docker.com/engine/install/")]
    DockerNotFound,

    #[error("Docker daemon is not running or not reachable")]
    DockerNotRunning,

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    // Source snapshot errors
    #[error("Project directory not found: {0}")]
    ProjectNotFound(PathBuf),

    #[error("Invalid project layout at {path}: {reason}")]
    ProjectLayout { path: PathBuf, reason: String },

    // Compiler cache errors
    #[error("Failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("Checksum mismatch for {asset}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        asset: String,
        expected: String,
        actual: String,
    },

    // Build stage errors
    #[error("Recipe preparation failed: {0}")]
    RecipeFailed(String),

    #[error("Compilation failed: {0}")]
    CompileFailed(String),

    #[error("Expected artifact missing after compilation: {0}")]
    ArtifactMissing(String),

    #[error("Test suite failed:\n{output}")]
    TestsFailed { output: String },

    #[error("Lint pass failed (warnings are errors):\n{output}")]
    LintFailed { output: String },

    #[error("Asset bundle build failed: {0}")]
    AssetBuildFailed(String),

    // Image errors
    #[error("Image build failed: {image}: {reason}")]
    ImageBuild { image: String, reason: String },

    #[error("Image publish failed: {reference}: {reason}")]
    ImagePush { reference: String, reason: String },

    // Cache volume errors
    #[error("Failed to create cache volume {name}: {reason}")]
    CacheVolumeCreate { name: String, reason: String },

    #[error("Cache volume not found: {0}")]
    CacheVolumeNotFound(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Whether the run aborted on an integrity failure rather than a build error
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, Self::ChecksumMismatch { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::DockerNotFound => {
                Some("Install Docker from https://docs.docker.com/engine/install/")
            }
            Self::DockerNotRunning => Some("Start the Docker daemon, e.g.: systemctl start docker"),
            Self::ProjectNotFound(_) => Some("Pass the repository root with --project"),
            Self::LintFailed { .. } => {
                Some("Run: cargo clippy --workspace --all-targets -- -D warnings")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = PipelineError::DockerNotFound;
        assert!(err.to_string().contains("Docker not found"));
    }

    #[test]
    fn error_hint() {
        let err = PipelineError::DockerNotRunning;
        assert_eq!(
            err.hint(),
            Some("Start the Docker daemon, e.g.: systemctl start docker")
        );
    }

    #[test]
    fn checksum_mismatch_is_integrity_failure() {
        let err = PipelineError::ChecksumMismatch {
            asset: "sccache.tar.gz".to_string(),
            expected: "aa".to_string(),
            actual: "bb".to_string(),
        };
        assert!(err.is_integrity_failure());
        assert!(!PipelineError::DockerNotFound.is_integrity_failure());
    }
}
