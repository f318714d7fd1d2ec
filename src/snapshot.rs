//! Source snapshot handling
//!
//! A `SourceSnapshot` is a read-only, filtered view of the repository tree.
//! Generated and dependency directories are excluded so stages never observe
//! build outputs as inputs. The snapshot also produces the "recipe view":
//! only dependency manifests and language entry points, which keeps dependency
//! compilation cacheable regardless of other source edits.

use crate::error::{PipelineError, PipelineResult};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Directory names never copied into any stage
const DEFAULT_EXCLUSIONS: [&str; 5] = ["target", "node_modules", "dist", ".git", ".pipeline"];

/// File names that make up the dependency recipe view
const MANIFEST_NAMES: [&str; 2] = ["Cargo.toml", "Cargo.lock"];
const ENTRY_POINT_NAMES: [&str; 2] = ["main.rs", "lib.rs"];

/// An immutable, filtered view of the repository tree
#[derive(Debug, Clone)]
pub struct SourceSnapshot {
    root: PathBuf,
    exclusions: BTreeSet<String>,
}

impl SourceSnapshot {
    /// Create a snapshot of the given repository root
    pub fn new(root: &Path) -> PipelineResult<Self> {
        let root = root
            .canonicalize()
            .map_err(|_| PipelineError::ProjectNotFound(root.to_path_buf()))?;

        if !root.join("Cargo.toml").is_file() {
            return Err(PipelineError::ProjectLayout {
                path: root,
                reason: "no Cargo.toml at the repository root".to_string(),
            });
        }

        Ok(Self {
            root,
            exclusions: DEFAULT_EXCLUSIONS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// The snapshot root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a directory name is excluded from every view
    pub fn is_excluded(&self, dir_name: &str) -> bool {
        self.exclusions.contains(dir_name)
    }

    /// Relative paths of all manifest and entry-point files, sorted.
    ///
    /// This is the complete input set of the dependency recipe: two
    /// snapshots agreeing on these files yield identical recipes.
    pub fn recipe_sources(&self) -> PipelineResult<Vec<PathBuf>> {
        let mut sources = Vec::new();

        for entry in self.walk() {
            let entry = entry.map_err(|e| {
                PipelineError::io(
                    format!("walking {}", self.root.display()),
                    e.into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("walkdir error")),
                )
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            if MANIFEST_NAMES.contains(&name.as_ref()) || ENTRY_POINT_NAMES.contains(&name.as_ref())
            {
                let rel = entry
                    .path()
                    .strip_prefix(&self.root)
                    .expect("walked path is under root")
                    .to_path_buf();
                sources.push(rel);
            }
        }

        sources.sort();
        debug!("Recipe view: {} files", sources.len());
        Ok(sources)
    }

    /// Copy only the recipe view into `dest`, preserving layout
    pub fn stage_recipe_view(&self, dest: &Path) -> PipelineResult<usize> {
        let sources = self.recipe_sources()?;
        for rel in &sources {
            self.copy_one(rel, dest)?;
        }
        Ok(sources.len())
    }

    /// Copy the full filtered tree into `dest`, preserving layout
    pub fn stage_full_view(&self, dest: &Path) -> PipelineResult<usize> {
        let mut copied = 0;

        for entry in self.walk() {
            let entry = entry.map_err(|e| {
                PipelineError::io(
                    format!("walking {}", self.root.display()),
                    e.into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("walkdir error")),
                )
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let rel = entry
                .path()
                .strip_prefix(&self.root)
                .expect("walked path is under root")
                .to_path_buf();
            self.copy_one(&rel, dest)?;
            copied += 1;
        }

        debug!("Full view: {} files staged", copied);
        Ok(copied)
    }

    /// Content fingerprint over the given relative paths (first 12 hex chars)
    pub fn fingerprint(&self, rel_paths: &[PathBuf]) -> PipelineResult<String> {
        let mut hasher = Sha256::new();

        for rel in rel_paths {
            let path = self.root.join(rel);
            let contents = fs::read(&path)
                .map_err(|e| PipelineError::io(format!("reading {}", path.display()), e))?;
            hasher.update(rel.to_string_lossy().as_bytes());
            hasher.update([0u8]);
            hasher.update(&contents);
        }

        let digest = hasher.finalize();
        Ok(hex::encode(&digest[..6]))
    }

    fn walk(&self) -> impl Iterator<Item = walkdir::Result<walkdir::DirEntry>> + '_ {
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 || !entry.file_type().is_dir() {
                    return true;
                }
                let name = entry.file_name().to_string_lossy();
                !self.exclusions.contains(name.as_ref())
            })
    }

    fn copy_one(&self, rel: &Path, dest: &Path) -> PipelineResult<()> {
        let from = self.root.join(rel);
        let to = dest.join(rel);

        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| PipelineError::io(format!("creating {}", parent.display()), e))?;
        }

        fs::copy(&from, &to).map_err(|e| {
            PipelineError::io(
                format!("copying {} to {}", from.display(), to.display()),
                e,
            )
        })?;
        Ok(())
    }
}

/// Hash a single file's contents (first 12 hex chars)
pub fn hash_file_contents(path: &Path) -> PipelineResult<String> {
    let contents =
        fs::read(path).map_err(|e| PipelineError::io(format!("reading {}", path.display()), e))?;

    let mut hasher = Sha256::new();
    hasher.update(&contents);
    let result = hasher.finalize();

    Ok(hex::encode(&result[..6]))
}
