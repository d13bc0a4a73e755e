//! Tree removal with bounded retries

use crate::error::{SparkleError, SparkleResult};
use std::io;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Retry policy for [`robust_remove_with`]
#[derive(Debug, Clone, Copy)]
pub struct RemovePolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RemovePolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Remove a file or directory tree, retrying with the default policy
pub async fn robust_remove(path: &Path) -> SparkleResult<()> {
    robust_remove_with(path, RemovePolicy::default()).await
}

/// Remove a file or directory tree.
///
/// A missing path is success. Between attempts read-only attributes are
/// cleared across the whole tree; after `policy.attempts` failures the last
/// OS error is returned as [`SparkleError::RemoveFailed`].
pub async fn robust_remove_with(path: &Path, policy: RemovePolicy) -> SparkleResult<()> {
    let attempts = policy.attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match remove_once(path).await {
            Ok(()) => {
                debug!("Removed {}", path.display());
                return Ok(());
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                warn!(
                    "Attempt {}/{} to remove {} failed: {}",
                    attempt,
                    attempts,
                    path.display(),
                    e
                );
                last_error = Some(e);
                if attempt < attempts {
                    let target = path.to_path_buf();
                    let _ = tokio::task::spawn_blocking(move || make_writable(&target)).await;
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }

    Err(SparkleError::RemoveFailed {
        path: path.to_path_buf(),
        attempts,
        source: last_error.unwrap_or_else(|| io::Error::other("removal failed")),
    })
}

async fn remove_once(path: &Path) -> io::Result<()> {
    let meta = tokio::fs::symlink_metadata(path).await?;
    if meta.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    }
}

/// Recursively clear read-only attributes under `path`.
///
/// Directories are visited before their contents so locked directories
/// become listable on the way down. Individual failures are ignored.
pub fn make_writable(path: &Path) {
    for entry in WalkDir::new(path).follow_links(false).into_iter().flatten() {
        if entry.path_is_symlink() {
            continue;
        }
        let _ = clear_readonly(entry.path());
    }
}

/// Grant the owner write access (and traversal, for directories)
pub(super) fn clear_readonly(path: &Path) -> io::Result<()> {
    let meta = std::fs::symlink_metadata(path)?;
    if meta.file_type().is_symlink() {
        return Ok(());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = meta.permissions().mode();
        let wanted = if meta.is_dir() { mode | 0o700 } else { mode | 0o600 };
        if wanted != mode {
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(wanted))?;
        }
    }

    #[cfg(not(unix))]
    {
        let mut perms = meta.permissions();
        if perms.readonly() {
            #[allow(clippy::permissions_set_readonly_false)]
            perms.set_readonly(false);
            std::fs::set_permissions(path, perms)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fast() -> RemovePolicy {
        RemovePolicy {
            attempts: 3,
            delay: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn remove_missing_path_is_ok() {
        let temp = TempDir::new().unwrap();
        robust_remove_with(&temp.path().join("nope"), fast()).await.unwrap();
    }

    #[tokio::test]
    async fn remove_single_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.txt");
        std::fs::write(&file, b"x").unwrap();

        robust_remove_with(&file, fast()).await.unwrap();
        assert!(!file.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn remove_tree_with_readonly_entries() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let root = temp.path().join("build_cache");
        let locked = root.join("locked");
        std::fs::create_dir_all(&locked).unwrap();
        std::fs::write(locked.join("inner.txt"), b"x").unwrap();
        std::fs::write(root.join("readonly.txt"), b"x").unwrap();

        std::fs::set_permissions(root.join("readonly.txt"), std::fs::Permissions::from_mode(0o444)).unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555)).unwrap();

        robust_remove_with(&root, fast()).await.unwrap();
        assert!(!root.exists());
    }

    #[cfg(unix)]
    #[test]
    fn make_writable_restores_owner_bits() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let file = temp.path().join("ro.bin");
        std::fs::write(&file, b"x").unwrap();
        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o444)).unwrap();

        make_writable(temp.path());

        let mode = std::fs::metadata(&file).unwrap().permissions().mode();
        assert_eq!(mode & 0o200, 0o200);
    }
}
