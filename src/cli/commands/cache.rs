//! Cache command - manage the pipeline's cache volumes

use crate::cache::{CacheVolume, VOLUME_PREFIX};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::error::PipelineResult;
use crate::runtime::{create_runtime, ContainerRuntime};
use crate::ui::{self, UiContext};
use console::style;

/// Execute the cache command
pub async fn execute(args: CacheArgs) -> PipelineResult<()> {
    let runtime = create_runtime();
    runtime.ensure_ready().await?;

    match args.action {
        CacheAction::List { format } => list_caches(runtime.as_ref(), format).await,
        CacheAction::Clear { yes } => clear_caches(runtime.as_ref(), yes).await,
    }
}

/// List the pipeline's labeled cache volumes
async fn list_caches(runtime: &dyn ContainerRuntime, format: OutputFormat) -> PipelineResult<()> {
    let volumes = runtime.volume_list(VOLUME_PREFIX).await?;

    let caches: Vec<CacheVolume> = volumes
        .iter()
        .filter_map(|v| CacheVolume::from_labels(&v.name, &v.labels))
        .collect();

    if caches.is_empty() {
        println!("No cache volumes found.");
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_cache_table(&caches),
        OutputFormat::Json => print_cache_json(&caches)?,
        OutputFormat::Plain => {
            for cache in &caches {
                println!("{}", cache.name);
            }
        }
    }

    Ok(())
}

fn print_cache_table(caches: &[CacheVolume]) {
    println!("{:<32} {:<8}", "VOLUME", "KIND");
    println!("{}", "-".repeat(42));

    for cache in caches {
        println!("{:<32} {:<8}", cache.name, cache.kind);
    }

    println!();
    println!("Total: {} cache(s)", caches.len());
}

fn print_cache_json(caches: &[CacheVolume]) -> PipelineResult<()> {
    #[derive(serde::Serialize)]
    struct CacheJson {
        name: String,
        kind: String,
    }

    let json_caches: Vec<CacheJson> = caches
        .iter()
        .map(|c| CacheJson {
            name: c.name.clone(),
            kind: c.kind.to_string(),
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&json_caches)?);
    Ok(())
}

/// Remove every pipeline cache volume
async fn clear_caches(runtime: &dyn ContainerRuntime, skip_confirm: bool) -> PipelineResult<()> {
    let ctx = UiContext::detect().with_auto_yes(skip_confirm);
    let volumes = runtime.volume_list(VOLUME_PREFIX).await?;

    if volumes.is_empty() {
        println!("No cache volumes to clear.");
        return Ok(());
    }

    println!("This will remove {} cache volume(s):", volumes.len());
    for vol in &volumes {
        println!("  {} {}", style("•").red(), vol.name);
    }
    println!();

    if !ui::confirm(&ctx, "Remove them?", false).await? {
        println!("Aborted.");
        return Ok(());
    }

    let mut removed = 0;
    for vol in volumes {
        runtime.volume_remove(&vol.name).await?;
        removed += 1;
    }

    println!("{} cleared {} cache(s)", style("✓").green(), removed);

    Ok(())
}
