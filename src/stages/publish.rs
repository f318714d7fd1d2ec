//! Publish coordination
//!
//! Forces evaluation of every assembled image, then either publishes the
//! full Images × Tags cross product or stops after evaluation in dry-run
//! mode. Evaluation is identical in both modes: a dry run still builds every
//! image and aborts on the same failures a publishing run would.

use crate::error::PipelineResult;
use crate::runtime::ContainerRuntime;
use crate::stages::image::ImagePlan;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Tag applied to every release alongside the resolved version
pub const LATEST_TAG: &str = "latest";

/// Resolve the tag set for a run: `{version, "latest"}`.
///
/// A set, so the two collapse when the resolved version is itself `latest`.
/// Iteration order is sorted, which makes publish order deterministic.
pub fn resolve_tags(version: &str) -> BTreeSet<String> {
    BTreeSet::from([version.to_string(), LATEST_TAG.to_string()])
}

/// Whether publish mode is enabled: only the exact value `"true"` publishes
pub fn publish_mode_from_env() -> bool {
    std::env::var("PUBLISH").map(|v| v == "true").unwrap_or(false)
}

/// Result of a coordinator run
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    /// Whether publish mode was enabled
    pub publish_mode: bool,
    /// Local tags of every evaluated image
    pub evaluated: Vec<String>,
    /// Every published reference, in publish order (empty on dry runs)
    pub published: Vec<String>,
}

/// Publishes or dry-runs the assembled image set
pub struct PublishCoordinator {
    publish: bool,
    tags: BTreeSet<String>,
}

impl PublishCoordinator {
    /// Create a coordinator for the given mode and resolved version
    pub fn new(publish: bool, version: &str) -> Self {
        Self {
            publish,
            tags: resolve_tags(version),
        }
    }

    /// The resolved tag set
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Evaluate every image, then publish the cross product when enabled.
    ///
    /// The shared base builds first and exactly once; each deployable image
    /// builds from it. Publishing is tag-major: all images for one tag
    /// complete before the next tag starts. Any failure aborts the run with
    /// no partial-publish continuation.
    pub async fn execute(
        &self,
        runtime: &dyn ContainerRuntime,
        plan: &ImagePlan,
    ) -> PipelineResult<PublishOutcome> {
        runtime.build_image(&plan.base).await?;

        let mut evaluated = Vec::with_capacity(plan.images.len());
        for spec in &plan.images {
            runtime.build_image(&spec.build).await?;
            evaluated.push(spec.local_tag.clone());
        }

        if !self.publish {
            info!(
                "Dry run: {} images evaluated, nothing published",
                evaluated.len()
            );
            return Ok(PublishOutcome {
                publish_mode: false,
                evaluated,
                published: Vec::new(),
            });
        }

        let mut published = Vec::with_capacity(plan.images.len() * self.tags.len());
        for tag in &self.tags {
            for spec in &plan.images {
                let reference = format!("{}:{}", spec.repository, tag);
                debug!("Publishing {reference}");
                runtime.tag_image(&spec.local_tag, &reference).await?;
                runtime.push_image(&reference).await?;
                published.push(reference);
            }
        }

        info!("Published {} references", published.len());
        Ok(PublishOutcome {
            publish_mode: true,
            evaluated,
            published,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::runtime::testing::RecordingRuntime;
    use crate::runtime::ImageBuild;
    use crate::stages::image::{ImagePlan, ImageSpec, BASE_TAG, DEPLOYABLES};
    use serial_test::serial;
    use std::path::PathBuf;

    fn fixture_plan() -> ImagePlan {
        let build = |tag: &str| ImageBuild {
            tag: tag.to_string(),
            context: PathBuf::from("/scratch/images"),
            dockerfile: PathBuf::from("/scratch/images/Dockerfile"),
        };

        ImagePlan {
            base: build(BASE_TAG),
            images: DEPLOYABLES
                .into_iter()
                .map(|(name, _)| ImageSpec {
                    name,
                    local_tag: format!("dbost-pipeline/{name}:build"),
                    repository: if name == "web" {
                        "ghcr.io/dbost-app/dbost".to_string()
                    } else {
                        format!("ghcr.io/dbost-app/dbost/{name}")
                    },
                    build: build(&format!("dbost-pipeline/{name}:build")),
                })
                .collect(),
        }
    }

    #[test]
    fn tags_are_version_plus_latest() {
        let tags = resolve_tags("1.2.3");
        assert_eq!(tags.len(), 2);
        assert!(tags.contains("1.2.3"));
        assert!(tags.contains("latest"));
    }

    #[test]
    fn tags_collapse_when_version_is_latest() {
        let tags = resolve_tags("latest");
        assert_eq!(tags.len(), 1);
        assert!(tags.contains("latest"));
    }

    #[test]
    #[serial]
    fn publish_mode_requires_exact_true() {
        std::env::remove_var("PUBLISH");
        assert!(!publish_mode_from_env());

        std::env::set_var("PUBLISH", "true");
        assert!(publish_mode_from_env());

        std::env::set_var("PUBLISH", "TRUE");
        assert!(!publish_mode_from_env());

        std::env::set_var("PUBLISH", "1");
        assert!(!publish_mode_from_env());

        std::env::remove_var("PUBLISH");
    }

    #[tokio::test]
    async fn publish_covers_the_full_cross_product() {
        // Scenario B: PUBLISH=true, VERSION=1.2.3 → exactly 8 publish operations
        let coordinator = PublishCoordinator::new(true, "1.2.3");
        let runtime = RecordingRuntime::new();

        let outcome = coordinator.execute(&runtime, &fixture_plan()).await.unwrap();

        assert!(outcome.publish_mode);
        assert_eq!(outcome.evaluated.len(), 4);
        assert_eq!(outcome.published.len(), 8);

        // No duplicate or skipped pairs
        let unique: BTreeSet<&String> = outcome.published.iter().collect();
        assert_eq!(unique.len(), 8);

        // Tag-major order: all images for one tag before the next tag
        assert!(outcome.published[..4]
            .iter()
            .all(|r| r.ends_with(":1.2.3")));
        assert!(outcome.published[4..]
            .iter()
            .all(|r| r.ends_with(":latest")));

        // The shared base builds exactly once, before any image
        let events = runtime.events();
        let base_builds: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| *e == &format!("build:{BASE_TAG}"))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(base_builds, vec![0]);
    }

    #[tokio::test]
    async fn dry_run_evaluates_everything_and_publishes_nothing() {
        // Scenario A: PUBLISH unset, VERSION unset → tags {latest}, 4 synced, 0 published
        let coordinator = PublishCoordinator::new(false, "latest");
        let runtime = RecordingRuntime::new();

        let outcome = coordinator.execute(&runtime, &fixture_plan()).await.unwrap();

        assert!(!outcome.publish_mode);
        assert_eq!(coordinator.tags().len(), 1);
        assert_eq!(outcome.evaluated.len(), 4);
        assert!(outcome.published.is_empty());

        let events = runtime.events();
        assert_eq!(events.iter().filter(|e| e.starts_with("build:")).count(), 5);
        assert_eq!(events.iter().filter(|e| e.starts_with("push:")).count(), 0);
    }

    #[tokio::test]
    async fn dry_run_build_failure_aborts_like_publish_mode() {
        let plan = fixture_plan();
        let failing_tag = plan.images[1].build.tag.clone();

        for publish in [false, true] {
            let coordinator = PublishCoordinator::new(publish, "1.2.3");
            let runtime = RecordingRuntime::new().with_fail_build_on(failing_tag.clone());

            let err = coordinator.execute(&runtime, &plan).await.unwrap_err();
            assert!(matches!(err, PipelineError::ImageBuild { .. }));

            // Nothing published once evaluation fails, in either mode
            let events = runtime.events();
            assert_eq!(events.iter().filter(|e| e.starts_with("push:")).count(), 0);
        }
    }

    #[tokio::test]
    async fn push_failure_stops_the_run() {
        let coordinator = PublishCoordinator::new(true, "1.2.3");
        let runtime =
            RecordingRuntime::new().with_fail_push_on("ghcr.io/dbost-app/dbost/migrator:1.2.3");

        let err = coordinator
            .execute(&runtime, &fixture_plan())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ImagePush { .. }));

        // The web push went through, then the run stopped: no continuation
        let events = runtime.events();
        let pushes: Vec<&String> = events.iter().filter(|e| e.starts_with("push:")).collect();
        assert_eq!(pushes.len(), 2);
        assert_eq!(pushes[0], "push:ghcr.io/dbost-app/dbost:1.2.3");
    }
}
