//! Plan command - show the resolved publish plan without executing

use crate::cli::args::{OutputFormat, PlanArgs};
use crate::config::Config;
use crate::error::PipelineResult;
use crate::stages::image::DEPLOYABLES;
use crate::stages::publish::resolve_tags;
use serde::Serialize;

/// One planned publish operation
#[derive(Debug, Clone, Serialize)]
pub struct PlannedPublish {
    /// Deployable unit name
    pub image: String,
    /// Tag applied
    pub tag: String,
    /// Full published reference
    pub reference: String,
}

/// Execute the plan command
pub fn execute(args: PlanArgs, config: &Config) -> PipelineResult<()> {
    let plan = build_plan(&args.version_tag, config);

    match args.format {
        OutputFormat::Table => print_table(&args.version_tag, &plan),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
        OutputFormat::Plain => {
            for entry in &plan {
                println!("{}", entry.reference);
            }
        }
    }

    Ok(())
}

/// Resolve the Images × Tags cross product, tag-major like the coordinator
pub fn build_plan(version: &str, config: &Config) -> Vec<PlannedPublish> {
    let tags = resolve_tags(version);
    let mut plan = Vec::with_capacity(tags.len() * DEPLOYABLES.len());

    for tag in &tags {
        for (name, _) in DEPLOYABLES {
            let repository = config.registry.image_repository(name);
            plan.push(PlannedPublish {
                image: name.to_string(),
                tag: tag.clone(),
                reference: format!("{repository}:{tag}"),
            });
        }
    }

    plan
}

fn print_table(version: &str, plan: &[PlannedPublish]) {
    println!("Publish plan for version {version}:");
    println!();
    println!("{:<12} {:<10} {}", "IMAGE", "TAG", "REFERENCE");
    println!("{}", "-".repeat(72));

    for entry in plan {
        println!(
            "{:<12} {:<10} {}",
            entry.image, entry.tag, entry.reference
        );
    }

    println!();
    println!("Total: {} publish operation(s)", plan.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_is_the_full_cross_product() {
        let config = Config::default();
        let plan = build_plan("1.2.3", &config);

        assert_eq!(plan.len(), 8);
        assert!(plan
            .iter()
            .any(|p| p.reference == "ghcr.io/dbost-app/dbost:1.2.3"));
        assert!(plan
            .iter()
            .any(|p| p.reference == "ghcr.io/dbost-app/dbost/db-cleaner:latest"));
    }

    #[test]
    fn plan_collapses_for_latest() {
        let config = Config::default();
        let plan = build_plan("latest", &config);

        assert_eq!(plan.len(), 4);
        assert!(plan.iter().all(|p| p.tag == "latest"));
    }

    #[test]
    fn plan_is_tag_major() {
        let config = Config::default();
        let plan = build_plan("1.2.3", &config);

        // Sorted tag order: 1.2.3 before latest, each tag's images together
        assert!(plan[..4].iter().all(|p| p.tag == "1.2.3"));
        assert!(plan[4..].iter().all(|p| p.tag == "latest"));
    }
}
