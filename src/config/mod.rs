//! Configuration management
//!
//! Configuration is discovered as a project-local `dbost-pipeline.toml`,
//! falling back to built-in defaults.

pub mod schema;

pub use schema::Config;

use crate::error::{PipelineError, PipelineResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Name of the project-local configuration file
pub const LOCAL_CONFIG_NAME: &str = "dbost-pipeline.toml";

/// Configuration manager
pub struct ConfigManager {
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Create a config manager that discovers a project-local file
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a config manager with an explicit path
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            config_path: Some(path),
        }
    }

    /// Find a project-local config by walking up from `start`
    pub fn find_local_config(start: &Path) -> Option<PathBuf> {
        for dir in start.ancestors() {
            let candidate = dir.join(LOCAL_CONFIG_NAME);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }

    /// Get the state directory path (scratch space for runs)
    pub fn state_dir() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dbost-pipeline")
    }

    /// Per-run scratch directories live under here
    pub fn runs_dir() -> PathBuf {
        Self::state_dir().join("runs")
    }

    /// Load configuration, using defaults when no file is present
    pub async fn load(&self, project_dir: &Path) -> PipelineResult<Config> {
        let path = match &self.config_path {
            Some(path) => {
                if !path.exists() {
                    return Err(PipelineError::ConfigNotFound(path.clone()));
                }
                Some(path.clone())
            }
            None => Self::find_local_config(project_dir),
        };

        match path {
            Some(path) => {
                debug!("Loading config from {}", path.display());
                self.load_from_file(&path).await
            }
            None => {
                debug!("No config file found, using defaults");
                Ok(Config::default())
            }
        }
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> PipelineResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| PipelineError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| PipelineError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Ensure the runs directory exists
    pub async fn ensure_state_dirs() -> PipelineResult<()> {
        let dir = Self::runs_dir();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| PipelineError::io(format!("creating directory {}", dir.display()), e))
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
