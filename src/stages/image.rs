//! Image assembly
//!
//! Stages build contexts for the shared runtime base and the four deployable
//! images. The base layer is defined once and every image builds from it, so
//! the runtime layer is cached and shared. Assembly itself is pure staging;
//! the publish coordinator forces evaluation by building each context.

use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};
use crate::runtime::ImageBuild;
use crate::stages::assets::AssetBundle;
use crate::stages::compile::{find_artifact, Artifact};
use std::fs;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Local tag of the shared runtime base image
pub const BASE_TAG: &str = "dbost-pipeline/base:build";

/// Deployable units: image name and the artifact it runs
pub const DEPLOYABLES: [(&str, &str); 4] = [
    ("web", "dbost"),
    ("migrator", "dbost-migration"),
    ("deployer", "dbost-jobs-deploy"),
    ("db-cleaner", "dbost-jobs-db-cleanup"),
];

/// One image to evaluate and publish
#[derive(Debug, Clone)]
pub struct ImageSpec {
    /// Deployable unit name
    pub name: &'static str,
    /// Local tag applied at build time
    pub local_tag: String,
    /// Registry repository the image publishes under
    pub repository: String,
    /// Staged build
    pub build: ImageBuild,
}

/// The full image set: shared base plus one spec per deployable unit
#[derive(Debug, Clone)]
pub struct ImagePlan {
    /// Shared runtime base, built once and reused
    pub base: ImageBuild,
    /// Deployable images, in publish order
    pub images: Vec<ImageSpec>,
}

/// Assembles image build contexts from compiled artifacts and the bundle
pub struct ImageAssembler<'a> {
    config: &'a Config,
    artifacts: &'a [Artifact],
    bundle: &'a AssetBundle,
    work_dir: &'a Path,
}

impl<'a> ImageAssembler<'a> {
    /// Create an image assembler
    pub fn new(
        config: &'a Config,
        artifacts: &'a [Artifact],
        bundle: &'a AssetBundle,
        work_dir: &'a Path,
    ) -> Self {
        Self {
            config,
            artifacts,
            bundle,
            work_dir,
        }
    }

    /// Stage every build context and return the plan
    pub fn prepare(&self) -> PipelineResult<ImagePlan> {
        let images_dir = self.work_dir.join("images");

        let base_dir = images_dir.join("base");
        fs::create_dir_all(&base_dir)
            .map_err(|e| PipelineError::io(format!("creating {}", base_dir.display()), e))?;
        let base_dockerfile = base_dir.join("Dockerfile");
        fs::write(
            &base_dockerfile,
            base_dockerfile_contents(&self.config.builder.runtime_image),
        )
        .map_err(|e| PipelineError::io("writing base Dockerfile", e))?;

        let base = ImageBuild {
            tag: BASE_TAG.to_string(),
            context: base_dir.clone(),
            dockerfile: base_dockerfile,
        };

        let mut images = Vec::with_capacity(DEPLOYABLES.len());
        for (name, artifact_name) in DEPLOYABLES {
            let artifact = find_artifact(self.artifacts, artifact_name)?;
            let context = images_dir.join(name);
            fs::create_dir_all(&context)
                .map_err(|e| PipelineError::io(format!("creating {}", context.display()), e))?;

            fs::copy(&artifact.path, context.join(artifact_name))
                .map_err(|e| PipelineError::io(format!("staging {artifact_name}"), e))?;

            let web = if name == "web" {
                copy_tree(&self.bundle.dir, &context.join("public"))?;
                Some((&self.config.web).into())
            } else {
                None
            };

            let dockerfile = context.join("Dockerfile");
            fs::write(&dockerfile, image_dockerfile_contents(artifact_name, web))
                .map_err(|e| PipelineError::io(format!("writing {name} Dockerfile"), e))?;

            debug!("Staged image context: {name}");
            images.push(ImageSpec {
                name,
                local_tag: format!("dbost-pipeline/{name}:build"),
                repository: self.config.registry.image_repository(name),
                build: ImageBuild {
                    tag: format!("dbost-pipeline/{name}:build"),
                    context,
                    dockerfile,
                },
            });
        }

        Ok(ImagePlan { base, images })
    }
}

/// Web image metadata carried into its Dockerfile
#[derive(Debug, Clone)]
pub struct WebImageMeta {
    /// Exposed HTTP port
    pub port: u16,
    /// Path the asset bundle is baked at, exported as WEB_PUBLIC_PATH
    pub public_path: String,
}

impl From<&crate::config::schema::WebConfig> for WebImageMeta {
    fn from(web: &crate::config::schema::WebConfig) -> Self {
        Self {
            port: web.port,
            public_path: web.public_path.clone(),
        }
    }
}

/// Shared runtime base: one package-manager bootstrap with a process-init
/// wrapper and a network client preinstalled.
pub(crate) fn base_dockerfile_contents(runtime_image: &str) -> String {
    format!(
        "FROM {runtime_image}\n\
         RUN apt-get update \\\n\
         \x20   && apt-get install -y --no-install-recommends tini curl ca-certificates \\\n\
         \x20   && rm -rf /var/lib/apt/lists/*\n\
         ENTRYPOINT [\"/usr/bin/tini\", \"--\"]\n"
    )
}

/// Per-deployable Dockerfile: base plus exactly one binary, plus the asset
/// bundle and its port/env for the web image.
pub(crate) fn image_dockerfile_contents(artifact: &str, web: Option<WebImageMeta>) -> String {
    let mut lines = vec![
        format!("FROM {BASE_TAG}"),
        format!("COPY {artifact} /usr/local/bin/{artifact}"),
    ];

    if let Some(meta) = web {
        lines.push(format!("COPY public {}", meta.public_path));
        lines.push(format!("ENV WEB_PUBLIC_PATH={}", meta.public_path));
        lines.push(format!("EXPOSE {}", meta.port));
    }

    lines.push(format!("CMD [\"/usr/local/bin/{artifact}\"]"));
    lines.push(String::new());
    lines.join("\n")
}

/// Recursively copy a directory tree
fn copy_tree(src: &Path, dest: &Path) -> PipelineResult<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| {
            PipelineError::io(
                format!("walking {}", src.display()),
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("walkdir error")),
            )
        })?;

        let rel = entry
            .path()
            .strip_prefix(src)
            .expect("walked path is under src");
        let target = dest.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| PipelineError::io(format!("creating {}", target.display()), e))?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| PipelineError::io(format!("creating {}", parent.display()), e))?;
            }
            fs::copy(entry.path(), &target)
                .map_err(|e| PipelineError::io(format!("copying to {}", target.display()), e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::compile::ARTIFACT_NAMES;
    use tempfile::TempDir;

    fn fixture_artifacts(dir: &Path) -> Vec<Artifact> {
        ARTIFACT_NAMES
            .into_iter()
            .map(|name| {
                let path = dir.join(name);
                fs::write(&path, "ELF").unwrap();
                Artifact { name, path }
            })
            .collect()
    }

    fn fixture_bundle(dir: &Path) -> AssetBundle {
        let dist = dir.join("dist");
        fs::create_dir_all(dist.join("assets")).unwrap();
        fs::write(dist.join("manifest.json"), "{}").unwrap();
        fs::write(dist.join("assets/main-abc123.js"), "js").unwrap();
        fs::write(dist.join("assets/main-abc123.js.br"), "br").unwrap();
        AssetBundle { dir: dist }
    }

    #[test]
    fn base_dockerfile_has_init_and_network_client() {
        let dockerfile = base_dockerfile_contents("debian:bookworm-slim");
        assert!(dockerfile.starts_with("FROM debian:bookworm-slim\n"));
        assert!(dockerfile.contains("tini"));
        assert!(dockerfile.contains("curl"));
        assert!(dockerfile.contains("ENTRYPOINT [\"/usr/bin/tini\", \"--\"]"));
    }

    #[test]
    fn job_dockerfile_is_base_plus_one_binary() {
        let dockerfile = image_dockerfile_contents("dbost-migration", None);
        assert!(dockerfile.starts_with(&format!("FROM {BASE_TAG}\n")));
        assert!(dockerfile.contains("COPY dbost-migration /usr/local/bin/dbost-migration"));
        assert!(dockerfile.contains("CMD [\"/usr/local/bin/dbost-migration\"]"));
        assert!(!dockerfile.contains("EXPOSE"));
        assert!(!dockerfile.contains("WEB_PUBLIC_PATH"));
    }

    #[test]
    fn web_dockerfile_adds_bundle_port_and_env() {
        let dockerfile = image_dockerfile_contents(
            "dbost",
            Some(WebImageMeta {
                port: 8000,
                public_path: "/var/www/public".to_string(),
            }),
        );
        assert!(dockerfile.contains("COPY public /var/www/public"));
        assert!(dockerfile.contains("ENV WEB_PUBLIC_PATH=/var/www/public"));
        assert!(dockerfile.contains("EXPOSE 8000"));
        assert!(dockerfile.contains("CMD [\"/usr/local/bin/dbost\"]"));
    }

    #[test]
    fn prepare_stages_base_and_four_images() {
        let scratch = TempDir::new().unwrap();
        let artifacts = fixture_artifacts(scratch.path());
        let bundle = fixture_bundle(scratch.path());
        let config = Config::default();

        let work = scratch.path().join("run");
        fs::create_dir_all(&work).unwrap();
        let assembler = ImageAssembler::new(&config, &artifacts, &bundle, &work);

        let plan = assembler.prepare().unwrap();

        assert_eq!(plan.base.tag, BASE_TAG);
        assert!(plan.base.dockerfile.is_file());
        assert_eq!(plan.images.len(), 4);

        let names: Vec<&str> = plan.images.iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["web", "migrator", "deployer", "db-cleaner"]);

        for spec in &plan.images {
            assert!(spec.build.dockerfile.is_file());
        }

        // Web context carries the bundle, including precompressed files
        let web = &plan.images[0];
        assert!(web.build.context.join("dbost").is_file());
        assert!(web.build.context.join("public/manifest.json").is_file());
        assert!(web
            .build
            .context
            .join("public/assets/main-abc123.js.br")
            .is_file());

        // Job contexts carry exactly their binary
        let migrator = &plan.images[1];
        assert!(migrator.build.context.join("dbost-migration").is_file());
        assert!(!migrator.build.context.join("public").exists());
    }

    #[test]
    fn prepare_resolves_registry_repositories() {
        let scratch = TempDir::new().unwrap();
        let artifacts = fixture_artifacts(scratch.path());
        let bundle = fixture_bundle(scratch.path());
        let config = Config::default();

        let work = scratch.path().join("run");
        fs::create_dir_all(&work).unwrap();
        let plan = ImageAssembler::new(&config, &artifacts, &bundle, &work)
            .prepare()
            .unwrap();

        assert_eq!(plan.images[0].repository, "ghcr.io/dbost-app/dbost");
        assert_eq!(
            plan.images[1].repository,
            "ghcr.io/dbost-app/dbost/migrator"
        );
        assert_eq!(
            plan.images[3].repository,
            "ghcr.io/dbost-app/dbost/db-cleaner"
        );
    }

    #[test]
    fn prepare_fails_on_missing_artifact() {
        let scratch = TempDir::new().unwrap();
        let mut artifacts = fixture_artifacts(scratch.path());
        artifacts.retain(|a| a.name != "dbost");
        let bundle = fixture_bundle(scratch.path());
        let config = Config::default();

        let work = scratch.path().join("run");
        fs::create_dir_all(&work).unwrap();
        let err = ImageAssembler::new(&config, &artifacts, &bundle, &work)
            .prepare()
            .unwrap_err();

        assert!(matches!(err, PipelineError::ArtifactMissing(name) if name == "dbost"));
    }
}
