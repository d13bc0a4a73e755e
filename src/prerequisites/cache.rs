//! Version-pinned tool cache under `build_cache/`
//!
//! Installs land in `.staging/<tool>-<version>-<uuid>` and are renamed to
//! `<tool>/<version>` only after they pass validation, so a half-finished
//! install is never visible at the final path.

use super::ToolKind;
use crate::archive::robust_remove;
use crate::error::{SparkleError, SparkleResult};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Cache directory name at the project root
pub const CACHE_DIR: &str = "build_cache";

#[derive(Debug, Clone)]
pub struct ToolCache {
    root: PathBuf,
}

impl ToolCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `build_cache/` under a project root
    pub fn for_project(project_root: &Path) -> Self {
        Self::new(project_root.join(CACHE_DIR))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final location of a cached install
    pub fn entry(&self, kind: ToolKind, version: Option<&str>) -> PathBuf {
        let dir = self.root.join(kind.cache_name());
        match version {
            Some(version) => dir.join(version),
            None => dir,
        }
    }

    /// Where downloaded archives are kept until extracted
    pub fn downloads_dir(&self) -> PathBuf {
        self.root.join(".downloads")
    }

    /// Create a fresh, uniquely named staging directory
    pub async fn create_staging(&self, kind: ToolKind, version: Option<&str>) -> SparkleResult<PathBuf> {
        let name = format!(
            "{}-{}-{}",
            kind.cache_name(),
            version.unwrap_or("latest"),
            uuid::Uuid::new_v4().simple()
        );
        let staging = self.root.join(".staging").join(name);
        tokio::fs::create_dir_all(&staging)
            .await
            .map_err(|e| SparkleError::io(format!("creating staging directory {}", staging.display()), e))?;
        debug!("Staging {} in {}", kind, staging.display());
        Ok(staging)
    }

    /// Move a validated staging directory to its final cache path
    pub async fn promote(&self, staging: &Path, entry: &Path) -> SparkleResult<()> {
        if tokio::fs::symlink_metadata(entry).await.is_ok() {
            robust_remove(entry).await?;
        }
        if let Some(parent) = entry.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SparkleError::io(format!("creating {}", parent.display()), e))?;
        }
        tokio::fs::rename(staging, entry).await.map_err(|e| {
            SparkleError::io(
                format!("moving {} to {}", staging.display(), entry.display()),
                e,
            )
        })
    }

    /// Remove a staging directory after a failed install
    pub async fn discard(&self, staging: &Path) {
        if let Err(e) = robust_remove(staging).await {
            warn!("Could not clean up {}: {}", staging.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn entry_paths() {
        let cache = ToolCache::for_project(Path::new("/project"));
        assert_eq!(
            cache.entry(ToolKind::Cmake, Some("3.30.5")),
            PathBuf::from("/project/build_cache/cmake/3.30.5")
        );
        assert_eq!(
            cache.entry(ToolKind::Vcpkg, None),
            PathBuf::from("/project/build_cache/vcpkg")
        );
    }

    #[tokio::test]
    async fn staging_dirs_are_unique() {
        let temp = TempDir::new().unwrap();
        let cache = ToolCache::for_project(temp.path());

        let a = cache.create_staging(ToolKind::Ninja, Some("1.12.1")).await.unwrap();
        let b = cache.create_staging(ToolKind::Ninja, Some("1.12.1")).await.unwrap();

        assert_ne!(a, b);
        assert!(a.is_dir() && b.is_dir());
        assert!(a.starts_with(temp.path().join("build_cache/.staging")));
    }

    #[tokio::test]
    async fn promote_replaces_existing_entry() {
        let temp = TempDir::new().unwrap();
        let cache = ToolCache::for_project(temp.path());
        let entry = cache.entry(ToolKind::Ninja, Some("1.12.1"));
        std::fs::create_dir_all(&entry).unwrap();
        std::fs::write(entry.join("stale"), b"x").unwrap();

        let staging = cache.create_staging(ToolKind::Ninja, Some("1.12.1")).await.unwrap();
        std::fs::write(staging.join("ninja"), b"bin").unwrap();

        cache.promote(&staging, &entry).await.unwrap();

        assert!(entry.join("ninja").exists());
        assert!(!entry.join("stale").exists());
        assert!(!staging.exists());
    }
}
