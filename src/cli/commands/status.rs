//! Status command - check host prerequisites and configuration

use crate::config::Config;
use crate::error::PipelineResult;
use crate::runtime::create_runtime;
use crate::sccache::SccacheConfig;
use console::{style, Emoji};
use std::env;
use std::path::Path;

static CHECK: Emoji<'_, '_> = Emoji("✓ ", "[OK] ");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "[FAIL] ");
static WARN: Emoji<'_, '_> = Emoji("⚠ ", "[WARN] ");

/// Execute the status command
pub async fn execute(config: &Config) -> PipelineResult<()> {
    println!("{}", style("dbost pipeline status").bold().cyan());
    println!();

    let mut all_ok = true;

    println!("{}", style("Container runtime:").bold());
    all_ok &= check_runtime().await;

    println!();
    println!("{}", style("Compile cache:").bold());
    check_sccache_config();

    println!();
    println!("{}", style("Project:").bold());
    all_ok &= check_project_layout();

    println!();
    println!("{}", style("Registry:").bold());
    println!(
        "  {} Publishing to {}",
        CHECK,
        config.registry.image_repository("web")
    );

    println!();
    if all_ok {
        println!("{}", style("All critical checks passed").green().bold());
    } else {
        println!(
            "{}",
            style("Some checks failed - see above for details")
                .yellow()
                .bold()
        );
    }

    Ok(())
}

async fn check_runtime() -> bool {
    let runtime = create_runtime();

    match runtime.is_available().await {
        Ok(true) => {
            println!("  {} {} available", CHECK, runtime.runtime_name());
            true
        }
        Ok(false) => {
            println!(
                "  {} {} - daemon not reachable",
                CROSS,
                style("Docker").red()
            );
            false
        }
        Err(e) => {
            println!("  {} {} - {}", CROSS, style("Docker").red(), e);
            false
        }
    }
}

/// Missing credentials are not an error: the pipeline degrades to an
/// uncached build. The status output just makes the mode visible.
fn check_sccache_config() {
    match SccacheConfig::from_env() {
        Some(config) => {
            println!(
                "  {} Remote cache configured ({})",
                CHECK,
                style(&config.endpoint).dim()
            );
            if config.bucket.is_none() {
                println!("  {} SCCACHE_BUCKET not set", WARN);
            }
        }
        None => {
            println!(
                "  {} Not configured - builds run uncached. Set SCCACHE_ENDPOINT and SCCACHE_ACCESS_KEY_ID to enable.",
                WARN
            );
        }
    }
}

fn check_project_layout() -> bool {
    let cwd = match env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            println!("  {} Cannot read current directory: {}", CROSS, e);
            return false;
        }
    };

    let mut ok = true;
    ok &= check_file(&cwd, "Cargo.toml", "workspace manifest");
    ok &= check_file(&cwd, "Cargo.lock", "dependency lock file");
    ok &= check_file(&cwd, "package.json", "frontend manifest");
    check_optional_file(&cwd, "pnpm-lock.yaml", "frontend lock file");
    ok
}

fn check_file(dir: &Path, name: &str, what: &str) -> bool {
    if dir.join(name).is_file() {
        println!("  {} {} ({})", CHECK, name, what);
        true
    } else {
        println!("  {} {} missing ({})", CROSS, style(name).red(), what);
        false
    }
}

fn check_optional_file(dir: &Path, name: &str, what: &str) {
    if dir.join(name).is_file() {
        println!("  {} {} ({})", CHECK, name, what);
    } else {
        println!("  {} {} missing ({})", WARN, style(name).yellow(), what);
    }
}
