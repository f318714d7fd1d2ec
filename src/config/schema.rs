//! Configuration schema for the pipeline
//!
//! Everything here is declarative: registry coordinates, toolchain images,
//! image metadata, and cache volume names. Loaded from `dbost-pipeline.toml`
//! when present, with defaults matching the dbost deployment.

use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Container registry coordinates
    pub registry: RegistryConfig,

    /// Toolchain images used by build stages
    pub builder: BuilderConfig,

    /// Web image metadata
    pub web: WebConfig,

    /// Cache volume names
    pub volumes: VolumesConfig,
}

/// Container registry coordinates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Registry host
    pub host: String,

    /// Registry namespace (organization)
    pub namespace: String,

    /// Root repository name for the application
    pub repository: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            host: "ghcr.io".to_string(),
            namespace: "dbost-app".to_string(),
            repository: "dbost".to_string(),
        }
    }
}

impl RegistryConfig {
    /// Full repository path for a deployable unit.
    ///
    /// The web image publishes at the root repository; the job images nest
    /// under it (`…/dbost/migrator` etc.).
    pub fn image_repository(&self, image: &str) -> String {
        if image == "web" {
            format!("{}/{}/{}", self.host, self.namespace, self.repository)
        } else {
            format!(
                "{}/{}/{}/{}",
                self.host, self.namespace, self.repository, image
            )
        }
    }
}

/// Toolchain images used by build stages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Rust toolchain image for recipe/compile/verify stages
    pub rust_image: String,

    /// Node toolchain image for the asset bundle stage
    pub node_image: String,

    /// Debian-family base for the shared runtime image
    pub runtime_image: String,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            rust_image: "rust:1.82-bookworm".to_string(),
            node_image: "node:20-bookworm-slim".to_string(),
            runtime_image: "debian:bookworm-slim".to_string(),
        }
    }
}

/// Web image metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Exposed HTTP port
    pub port: u16,

    /// Path the asset bundle is baked at, exported as WEB_PUBLIC_PATH
    pub public_path: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            public_path: "/var/www/public".to_string(),
        }
    }
}

/// Cache volume names
///
/// Volumes are shared across runs; the target volume caches compiled
/// dependencies keyed by the recipe, the pnpm volume caches the package
/// store independently of the compile caches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumesConfig {
    /// Compiled-output (cargo target) cache volume
    pub target: String,

    /// Cargo home (registry + installed tools) cache volume
    pub cargo: String,

    /// pnpm package store cache volume
    pub pnpm: String,
}

impl Default for VolumesConfig {
    fn default() -> Self {
        Self {
            target: "dbost-pipeline-target".to_string(),
            cargo: "dbost-pipeline-cargo".to_string(),
            pnpm: "dbost-pipeline-pnpm".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_paths() {
        let registry = RegistryConfig::default();
        assert_eq!(registry.image_repository("web"), "ghcr.io/dbost-app/dbost");
        assert_eq!(
            registry.image_repository("migrator"),
            "ghcr.io/dbost-app/dbost/migrator"
        );
        assert_eq!(
            registry.image_repository("db-cleaner"),
            "ghcr.io/dbost-app/dbost/db-cleaner"
        );
    }

    #[test]
    fn config_toml_roundtrip() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.registry.host, config.registry.host);
        assert_eq!(parsed.web.port, 8000);
    }

    #[test]
    fn partial_config_uses_defaults() {
        let parsed: Config = toml::from_str("[registry]\nnamespace = \"acme\"\n").unwrap();
        assert_eq!(parsed.registry.namespace, "acme");
        assert_eq!(parsed.registry.host, "ghcr.io");
        assert_eq!(parsed.volumes.target, "dbost-pipeline-target");
    }
}
