//! Remote compiler cache provisioning
//!
//! Downloads, verifies, and installs sccache into compile stages. The
//! provisioner is constructed once by the orchestrator: either `Active`,
//! holding the verified binary and the storage credentials, or `Disabled`,
//! in which case `install` is the identity transform and `stats` yields
//! nothing. Missing configuration is silent degradation; a checksum
//! mismatch on the downloaded tool is fatal.

use crate::error::{PipelineError, PipelineResult};
use crate::runtime::{ContainerRuntime, ExecSpec};
use crate::sccache::release::{fetch_latest_release, resolve_tool, ResolvedTool};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Where the wrapper binary is installed inside stage containers
pub const WRAPPER_PATH: &str = "/usr/local/bin/sccache";

/// Cache directory for sccache bookkeeping inside stage containers
const CACHE_DIR: &str = "/work/.sccache";

const ENV_BUCKET: &str = "SCCACHE_BUCKET";
const ENV_REGION: &str = "SCCACHE_REGION";
const ENV_ENDPOINT: &str = "SCCACHE_ENDPOINT";
const ENV_ACCESS_KEY: &str = "SCCACHE_ACCESS_KEY_ID";
const ENV_SECRET_KEY: &str = "SCCACHE_SECRET_ACCESS_KEY";

/// Remote cache storage credentials, sourced from the environment.
///
/// Either fully usable (endpoint + access key present) or absent; partial
/// credentials are treated as "not configured", never as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SccacheConfig {
    /// Storage bucket
    pub bucket: Option<String>,
    /// Storage region
    pub region: Option<String>,
    /// S3-compatible endpoint
    pub endpoint: String,
    /// Access key id
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: Option<String>,
}

impl SccacheConfig {
    /// Read credentials from the environment.
    ///
    /// Returns None unless both endpoint and access key are present and
    /// non-empty.
    pub fn from_env() -> Option<Self> {
        let endpoint = non_empty_var(ENV_ENDPOINT)?;
        let access_key_id = non_empty_var(ENV_ACCESS_KEY)?;

        Some(Self {
            bucket: non_empty_var(ENV_BUCKET),
            region: non_empty_var(ENV_REGION),
            endpoint,
            access_key_id,
            secret_access_key: non_empty_var(ENV_SECRET_KEY),
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// The compile-cache provisioner
#[derive(Debug)]
pub enum Provisioner {
    /// No credentials or no resolvable tool: install is identity, stats is none
    Disabled,
    /// Verified binary ready to inject into stages
    Active(ActiveProvisioner),
}

/// State of an activated provisioner
#[derive(Debug)]
pub struct ActiveProvisioner {
    /// Host path of the verified sccache binary
    pub binary: PathBuf,
    /// Storage credentials
    pub config: SccacheConfig,
}

impl Provisioner {
    /// Resolve, download, verify, and extract the cache tool.
    ///
    /// Called once by the orchestrator before the compile stage. Blocking:
    /// run it on a blocking task from async contexts.
    pub fn init(scratch_dir: &Path) -> PipelineResult<Self> {
        let Some(config) = SccacheConfig::from_env() else {
            debug!("sccache credentials not configured, compile cache disabled");
            return Ok(Self::Disabled);
        };

        let Some(release) = fetch_latest_release() else {
            return Ok(Self::Disabled);
        };

        let Some(tool) = resolve_tool(&release, std::env::consts::ARCH) else {
            return Ok(Self::Disabled);
        };

        let binary = download_and_verify(&tool, scratch_dir)?;
        info!("sccache {} installed from verified archive", tool.version);

        Ok(Self::Active(ActiveProvisioner { binary, config }))
    }

    /// Whether the remote cache is active
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    /// Inject the wrapper into a stage.
    ///
    /// Identity when disabled. When active, bind-mounts the binary and
    /// applies the wrapper environment, skipping absent credentials.
    pub fn install(&self, spec: ExecSpec) -> ExecSpec {
        let Self::Active(active) = self else {
            return spec;
        };

        let mut spec = spec.with_bind(active.binary.clone(), WRAPPER_PATH, true);
        apply_present(
            &mut spec.env,
            &[
                ("RUSTC_WRAPPER", Some(WRAPPER_PATH)),
                ("SCCACHE_DIR", Some(CACHE_DIR)),
                ("CARGO_INCREMENTAL", Some("0")),
                (ENV_BUCKET, active.config.bucket.as_deref()),
                (ENV_REGION, active.config.region.as_deref()),
                (ENV_ENDPOINT, Some(active.config.endpoint.as_str())),
                (ENV_ACCESS_KEY, Some(active.config.access_key_id.as_str())),
                (ENV_SECRET_KEY, active.config.secret_access_key.as_deref()),
            ],
        );
        spec
    }

    /// Capture the cache statistics report, or None when disabled
    pub async fn stats(
        &self,
        runtime: &dyn ContainerRuntime,
        image: &str,
    ) -> PipelineResult<Option<String>> {
        if !self.is_active() {
            return Ok(None);
        }

        let spec = self.install(
            ExecSpec::new(image, "/work").with_command(["sccache", "--show-stats"]),
        );
        let output = runtime.exec(&spec).await?;
        output.require_success("sccache --show-stats")?;

        Ok(Some(output.stdout))
    }
}

/// Apply only the present, non-empty values from a mapping of optionals
pub fn apply_present(env: &mut BTreeMap<String, String>, pairs: &[(&str, Option<&str>)]) {
    for (key, value) in pairs {
        match value {
            Some(v) if !v.is_empty() => {
                env.insert(key.to_string(), v.to_string());
            }
            _ => {}
        }
    }
}

/// Form the canonical check line: the checksum file carries a bare digest,
/// the verification format requires the trailing file name.
pub fn check_line(record: &str, file_name: &str) -> String {
    format!("{}  {}", record.trim(), file_name)
}

/// Verify archive bytes against a check line, returning the digest.
///
/// A mismatch is fatal: the pipeline aborts rather than degrading to an
/// uncached build.
pub fn verify_archive(bytes: &[u8], line: &str, asset: &str) -> PipelineResult<String> {
    let expected = line
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();

    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let actual = hex::encode(hasher.finalize());

    if actual == expected {
        Ok(actual)
    } else {
        Err(PipelineError::ChecksumMismatch {
            asset: asset.to_string(),
            expected,
            actual,
        })
    }
}

/// Download a URL into memory
fn download(url: &str) -> PipelineResult<Vec<u8>> {
    debug!("Downloading {url}");

    let mut response = ureq::get(url)
        .header("User-Agent", "dbost-pipeline")
        .call()
        .map_err(|e| PipelineError::Download {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    response
        .body_mut()
        .with_config()
        .limit(256 * 1024 * 1024)
        .read_to_vec()
        .map_err(|e| PipelineError::Download {
            url: url.to_string(),
            reason: e.to_string(),
        })
}

/// Download the archive and checksum, verify, extract, and return the
/// host path of the sccache binary.
fn download_and_verify(tool: &ResolvedTool, scratch_dir: &Path) -> PipelineResult<PathBuf> {
    let archive_bytes = download(&tool.archive.browser_download_url)?;
    let checksum_bytes = download(&tool.checksum.browser_download_url)?;

    let record = String::from_utf8_lossy(&checksum_bytes);
    let line = check_line(&record, &tool.archive.name);
    verify_archive(&archive_bytes, &line, &tool.archive.name)?;
    debug!("sccache archive checksum verified");

    let archive_path = scratch_dir.join(&tool.archive.name);
    fs::write(&archive_path, &archive_bytes)
        .map_err(|e| PipelineError::io(format!("writing {}", archive_path.display()), e))?;

    extract_binary(&archive_path, scratch_dir)
}

/// Extract the archive and locate the sccache binary inside it
fn extract_binary(archive_path: &Path, scratch_dir: &Path) -> PipelineResult<PathBuf> {
    let output = Command::new("tar")
        .arg("-xzf")
        .arg(archive_path)
        .arg("-C")
        .arg(scratch_dir)
        .output()
        .map_err(|e| PipelineError::command_failed("tar -xzf", e))?;

    if !output.status.success() {
        return Err(PipelineError::command_exec(
            "tar -xzf",
            String::from_utf8_lossy(&output.stderr),
        ));
    }

    // Archives unpack to sccache-<tag>-<target>/sccache
    let dir_name = archive_path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_suffix(".tar.gz"))
        .ok_or_else(|| PipelineError::Internal("unexpected archive name".to_string()))?;

    let binary = scratch_dir.join(dir_name).join("sccache");
    if !binary.is_file() {
        return Err(PipelineError::PathNotFound(binary));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o755);
        fs::set_permissions(&binary, perms)
            .map_err(|e| PipelineError::io("marking sccache executable", e))?;
    }

    Ok(binary)
}
