//! Cache volume management
//!
//! The pipeline mounts three persistent, named volumes into its stages: the
//! compiled-output (target) cache, the cargo home cache, and the pnpm package
//! store. Volumes are shared across runs; the underlying volume store is
//! responsible for isolating concurrent writers. A miss only costs time.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::PipelineResult;
use crate::runtime::{ContainerRuntime, VolumeMount};

/// Volume label keys used to track cache metadata
pub mod labels {
    /// Marks a volume as a pipeline cache
    pub const PIPELINE_CACHE: &str = "app.dbost.pipeline.cache";
    /// The cache kind (target, cargo, pnpm)
    pub const KIND: &str = "app.dbost.pipeline.cache.kind";
    /// Creation timestamp (RFC3339)
    pub const CREATED_AT: &str = "app.dbost.pipeline.cache.created_at";
}

/// What a cache volume stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    /// Compiled dependency output (cargo target directory)
    Target,
    /// Cargo home: registry index, crate sources, installed tools
    Cargo,
    /// pnpm content-addressed package store
    Pnpm,
}

impl CacheKind {
    /// Mount path inside stage containers
    pub fn mount_path(&self) -> &'static str {
        match self {
            Self::Target => "/work/target",
            Self::Cargo => "/cache/cargo",
            Self::Pnpm => "/pnpm/store",
        }
    }

    /// Environment variables pointing the toolchain at this cache
    pub fn env_vars(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Target => &[],
            Self::Cargo => &[("CARGO_HOME", "/cache/cargo")],
            Self::Pnpm => &[("npm_config_store_dir", "/pnpm/store")],
        }
    }

    /// Parse from label value
    pub fn from_label(s: &str) -> Option<Self> {
        match s {
            "target" => Some(Self::Target),
            "cargo" => Some(Self::Cargo),
            "pnpm" => Some(Self::Pnpm),
            _ => None,
        }
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Target => "target",
            Self::Cargo => "cargo",
            Self::Pnpm => "pnpm",
        };
        write!(f, "{}", name)
    }
}

/// A pipeline cache volume
#[derive(Debug, Clone)]
pub struct CacheVolume {
    /// Volume name
    pub name: String,
    /// What the volume stores
    pub kind: CacheKind,
}

impl CacheVolume {
    /// Create a cache volume record
    pub fn new(name: impl Into<String>, kind: CacheKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Generate labels for volume creation
    pub fn labels(&self) -> HashMap<String, String> {
        let mut labels = HashMap::new();
        labels.insert(labels::PIPELINE_CACHE.to_string(), "true".to_string());
        labels.insert(labels::KIND.to_string(), self.kind.to_string());
        labels.insert(labels::CREATED_AT.to_string(), Utc::now().to_rfc3339());
        labels
    }

    /// Try to parse from volume labels
    pub fn from_labels(name: &str, labels: &HashMap<String, String>) -> Option<Self> {
        if labels.get(labels::PIPELINE_CACHE).map(String::as_str) != Some("true") {
            return None;
        }

        let kind = labels
            .get(labels::KIND)
            .and_then(|s| CacheKind::from_label(s))?;

        Some(Self {
            name: name.to_string(),
            kind,
        })
    }

    /// The mount for stage containers
    pub fn mount(&self) -> VolumeMount {
        VolumeMount {
            name: self.name.clone(),
            container: self.kind.mount_path().to_string(),
        }
    }

    /// Ensure the volume exists, creating it with labels on first use
    pub async fn ensure(&self, runtime: &dyn ContainerRuntime) -> PipelineResult<VolumeMount> {
        if runtime.volume_inspect(&self.name).await?.is_none() {
            runtime.volume_create(&self.name, &self.labels()).await?;
        }
        Ok(self.mount())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_kind_mount_paths() {
        assert_eq!(CacheKind::Target.mount_path(), "/work/target");
        assert_eq!(CacheKind::Cargo.mount_path(), "/cache/cargo");
        assert_eq!(CacheKind::Pnpm.mount_path(), "/pnpm/store");
    }

    #[test]
    fn cache_kind_env_vars() {
        assert!(CacheKind::Target.env_vars().is_empty());
        assert_eq!(
            CacheKind::Cargo.env_vars(),
            &[("CARGO_HOME", "/cache/cargo")]
        );
        assert_eq!(
            CacheKind::Pnpm.env_vars(),
            &[("npm_config_store_dir", "/pnpm/store")]
        );
    }

    #[test]
    fn cache_kind_label_roundtrip() {
        for kind in [CacheKind::Target, CacheKind::Cargo, CacheKind::Pnpm] {
            let label = kind.to_string();
            assert_eq!(CacheKind::from_label(&label), Some(kind));
        }
        assert_eq!(CacheKind::from_label("npm"), None);
    }

    #[test]
    fn cache_volume_labels() {
        let vol = CacheVolume::new("dbost-pipeline-target", CacheKind::Target);
        let labels = vol.labels();

        assert_eq!(
            labels.get(labels::PIPELINE_CACHE),
            Some(&"true".to_string())
        );
        assert_eq!(labels.get(labels::KIND), Some(&"target".to_string()));
        assert!(labels.contains_key(labels::CREATED_AT));
    }

    #[test]
    fn cache_volume_from_labels() {
        let vol = CacheVolume::new("dbost-pipeline-pnpm", CacheKind::Pnpm);
        let parsed = CacheVolume::from_labels("dbost-pipeline-pnpm", &vol.labels()).unwrap();

        assert_eq!(parsed.kind, CacheKind::Pnpm);
        assert_eq!(parsed.name, "dbost-pipeline-pnpm");
    }

    #[test]
    fn from_labels_rejects_foreign_volumes() {
        let labels = HashMap::from([("some.other.label".to_string(), "true".to_string())]);
        assert!(CacheVolume::from_labels("random", &labels).is_none());
    }

    #[test]
    fn cache_volume_mount() {
        let vol = CacheVolume::new("dbost-pipeline-cargo", CacheKind::Cargo);
        let mount = vol.mount();
        assert_eq!(mount.mount_arg(), "dbost-pipeline-cargo:/cache/cargo");
    }
}
