//! sccache release resolution
//!
//! Queries the latest upstream sccache release and locates the platform
//! archive plus its checksum asset. Every step of the lookup is optional:
//! a missing release, an unparsable tag, or an absent asset degrades the
//! provisioner to a no-op instead of failing the run.

use semver::Version;
use serde::Deserialize;
use tracing::{debug, warn};

/// Upstream release endpoint
const LATEST_RELEASE_URL: &str = "https://api.github.com/repos/mozilla/sccache/releases/latest";

/// Oldest release with the S3-compatible storage behavior the pipeline relies on
const MIN_RELEASE: Version = Version::new(0, 7, 0);

/// A published release
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    /// Release tag, e.g. `v0.8.2`
    pub tag_name: String,
    /// Downloadable assets
    pub assets: Vec<ReleaseAsset>,
}

/// One downloadable release asset
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    /// Asset file name
    pub name: String,
    /// Direct download URL
    pub browser_download_url: String,
}

/// A fully resolved tool: archive plus checksum asset
#[derive(Debug, Clone)]
pub struct ResolvedTool {
    /// Release version (tag without the `v` prefix)
    pub version: Version,
    /// The platform archive
    pub archive: ReleaseAsset,
    /// The archive's checksum file
    pub checksum: ReleaseAsset,
}

/// Fetch the latest release, or None if the lookup fails
pub fn fetch_latest_release() -> Option<Release> {
    let response = ureq::get(LATEST_RELEASE_URL)
        .header("User-Agent", "dbost-pipeline")
        .call();

    let mut response = match response {
        Ok(r) => r,
        Err(e) => {
            warn!("sccache release lookup failed, compile cache disabled: {e}");
            return None;
        }
    };

    let body = match response.body_mut().read_to_string() {
        Ok(b) => b,
        Err(e) => {
            warn!("sccache release response unreadable, compile cache disabled: {e}");
            return None;
        }
    };

    match serde_json::from_str::<Release>(&body) {
        Ok(release) => {
            debug!("Latest sccache release: {}", release.tag_name);
            Some(release)
        }
        Err(e) => {
            warn!("sccache release response malformed, compile cache disabled: {e}");
            None
        }
    }
}

/// Archive file name for a release tag and target architecture
pub fn archive_name(tag: &str, arch: &str) -> String {
    format!("sccache-{tag}-{arch}-unknown-linux-musl.tar.gz")
}

/// Resolve the platform archive and checksum asset from a release.
///
/// Build stages run in linux containers, so the archive is always the
/// musl linux build for the host architecture.
pub fn resolve_tool(release: &Release, arch: &str) -> Option<ResolvedTool> {
    let version = match Version::parse(release.tag_name.trim_start_matches('v')) {
        Ok(v) => v,
        Err(_) => {
            warn!(
                "sccache release tag {:?} is not a version, compile cache disabled",
                release.tag_name
            );
            return None;
        }
    };

    if version < MIN_RELEASE {
        warn!(
            "sccache {} is older than supported {}, compile cache disabled",
            version, MIN_RELEASE
        );
        return None;
    }

    let wanted = archive_name(&release.tag_name, arch);
    let archive = match release.assets.iter().find(|a| a.name == wanted) {
        Some(a) => a.clone(),
        None => {
            warn!("no sccache asset named {wanted}, compile cache disabled");
            return None;
        }
    };

    let checksum_name = format!("{}.sha256", wanted);
    let checksum = match release.assets.iter().find(|a| a.name == checksum_name) {
        Some(a) => a.clone(),
        None => {
            warn!("no checksum asset named {checksum_name}, compile cache disabled");
            return None;
        }
    };

    Some(ResolvedTool {
        version,
        archive,
        checksum,
    })
}
