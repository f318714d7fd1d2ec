//! Run command - execute the full pipeline

use crate::cli::args::RunArgs;
use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::{self, RunOptions};
use crate::runtime::create_runtime;
use crate::stages::publish::publish_mode_from_env;
use crate::ui::{self, StageProgress, UiContext};
use std::env;
use std::path::PathBuf;
use tracing::debug;

/// Execute the run command
pub async fn execute(args: RunArgs, config: &Config) -> PipelineResult<()> {
    let ctx = UiContext::detect();
    ui::intro(&ctx, "dbost pipeline");

    let project_dir = resolve_project_dir(&args)?;
    pipeline::preflight(&project_dir)?;

    let runtime = create_runtime();
    runtime.ensure_ready().await?;
    debug!("Using runtime: {}", runtime.runtime_name());

    let publish = args.publish || publish_mode_from_env();
    let options = RunOptions {
        project_dir,
        publish,
        version: args.version_tag.clone(),
    };

    ui::key_value(&ctx, "Project", &options.project_dir.display().to_string());
    ui::key_value(&ctx, "Version", &options.version);
    ui::key_value(&ctx, "Mode", if publish { "publish" } else { "dry-run" });

    let mut progress = StageProgress::new(&ctx, pipeline::STAGE_COUNT);
    let result = pipeline::run(&options, config, runtime.as_ref(), &mut |stage| {
        progress.stage(stage);
    })
    .await;
    progress.finish();

    let summary = result?;

    ui::captured_block(&ctx, "Test output", &summary.verify.test_output);
    ui::captured_block(&ctx, "Lint output", &summary.verify.lint_output);

    if let Some(stats) = &summary.cache_stats {
        ui::captured_block(&ctx, "Compile cache statistics", stats);
    }

    if summary.outcome.publish_mode {
        ui::section(&ctx, "Published");
        for reference in &summary.outcome.published {
            ui::step_ok(&ctx, reference);
        }
    } else {
        ui::section(&ctx, "Dry run");
        ui::remark(
            &ctx,
            &format!(
                "{} images evaluated, nothing published (set PUBLISH=true to publish)",
                summary.outcome.evaluated.len()
            ),
        );
    }

    ui::outro_success(
        &ctx,
        &format!(
            "Run {} finished in {}s",
            summary.run_id,
            summary.duration.as_secs()
        ),
    );

    Ok(())
}

fn resolve_project_dir(args: &RunArgs) -> PipelineResult<PathBuf> {
    if let Some(ref path) = args.project {
        return path
            .canonicalize()
            .map_err(|_| PipelineError::ProjectNotFound(path.clone()));
    }

    env::current_dir().map_err(|e| PipelineError::io("getting current directory", e))
}
