//! Zip compression and directory copying

use crate::error::{SparkleError, SparkleResult};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Zip `source` into `dest_zip`, replacing any existing archive.
///
/// A directory is stored under its own name, so `output/build` unpacks to
/// `build/...` and `sparkle.app` unpacks to `sparkle.app/...`.
pub async fn compress(source: &Path, dest_zip: &Path) -> SparkleResult<()> {
    info!("Compressing {} to {}", source.display(), dest_zip.display());

    let source = source.to_path_buf();
    let dest = dest_zip.to_path_buf();
    tokio::task::spawn_blocking(move || compress_blocking(&source, &dest))
        .await
        .map_err(|e| SparkleError::Internal(format!("compression task failed: {}", e)))?
}

fn compress_blocking(source: &Path, dest: &Path) -> SparkleResult<()> {
    let meta = std::fs::symlink_metadata(source)
        .map_err(|e| SparkleError::io(format!("reading {}", source.display()), e))?;

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| SparkleError::io(format!("creating {}", parent.display()), e))?;
    }
    if dest.exists() {
        std::fs::remove_file(dest).map_err(|e| SparkleError::io(format!("replacing {}", dest.display()), e))?;
    }

    let file = File::create(dest).map_err(|e| SparkleError::io(format!("creating {}", dest.display()), e))?;
    let mut zip = ZipWriter::new(file);
    let base = source.parent().unwrap_or(Path::new(""));
    let zip_err = |e: zip::result::ZipError| SparkleError::Internal(format!("writing {}: {}", dest.display(), e));

    if !meta.is_dir() {
        let name = entry_name(base, source)?;
        zip.start_file(name, file_options(&meta)).map_err(zip_err)?;
        let mut input = File::open(source).map_err(|e| SparkleError::io(format!("reading {}", source.display()), e))?;
        io::copy(&mut input, &mut zip).map_err(|e| SparkleError::io(format!("compressing {}", source.display()), e))?;
    } else {
        let mut count = 0usize;
        for entry in WalkDir::new(source).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| SparkleError::Internal(format!("walking {}: {}", source.display(), e)))?;
            let path = entry.path();
            let name = entry_name(base, path)?;
            let meta = entry
                .metadata()
                .map_err(|e| SparkleError::Internal(format!("reading {}: {}", path.display(), e)))?;

            if entry.path_is_symlink() {
                let target = std::fs::read_link(path)
                    .map_err(|e| SparkleError::io(format!("reading link {}", path.display()), e))?;
                zip.add_symlink(name, target.to_string_lossy(), SimpleFileOptions::default())
                    .map_err(zip_err)?;
            } else if meta.is_dir() {
                zip.add_directory(name, file_options(&meta)).map_err(zip_err)?;
            } else {
                zip.start_file(name, file_options(&meta)).map_err(zip_err)?;
                let mut input = File::open(path).map_err(|e| SparkleError::io(format!("reading {}", path.display()), e))?;
                io::copy(&mut input, &mut zip).map_err(|e| SparkleError::io(format!("compressing {}", path.display()), e))?;
            }
            count += 1;
        }
        debug!("Stored {} entries", count);
    }

    zip.finish().map_err(zip_err)?;
    Ok(())
}

fn entry_name(base: &Path, path: &Path) -> SparkleResult<String> {
    let relative = path
        .strip_prefix(base)
        .map_err(|_| SparkleError::Internal(format!("{} is outside {}", path.display(), base.display())))?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

#[cfg(unix)]
fn file_options(meta: &std::fs::Metadata) -> SimpleFileOptions {
    use std::os::unix::fs::PermissionsExt;
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(meta.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn file_options(_meta: &std::fs::Metadata) -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// Copy a directory tree into `dest`, recreating symlinks instead of following them
pub async fn copy_dir(source: &Path, dest: &Path) -> SparkleResult<()> {
    let source = source.to_path_buf();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || copy_dir_blocking(&source, &dest))
        .await
        .map_err(|e| SparkleError::Internal(format!("copy task failed: {}", e)))?
}

fn copy_dir_blocking(source: &Path, dest: &Path) -> SparkleResult<()> {
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(|e| SparkleError::Internal(format!("walking {}: {}", source.display(), e)))?;
        let relative = entry.path().strip_prefix(source).unwrap_or(Path::new(""));
        let target: PathBuf = dest.join(relative);

        if entry.path_is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)
                .map_err(|e| SparkleError::io(format!("creating {}", target.display()), e))?;
        } else {
            if target.exists() {
                super::remove::clear_readonly(&target).ok();
            }
            std::fs::copy(entry.path(), &target)
                .map_err(|e| SparkleError::io(format!("copying {}", entry.path().display()), e))?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> SparkleResult<()> {
    let points_to = std::fs::read_link(link).map_err(|e| SparkleError::io(format!("reading link {}", link.display()), e))?;
    if target.symlink_metadata().is_ok() {
        std::fs::remove_file(target).map_err(|e| SparkleError::io(format!("replacing {}", target.display()), e))?;
    }
    std::os::unix::fs::symlink(points_to, target)
        .map_err(|e| SparkleError::io(format!("linking {}", target.display()), e))
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> SparkleResult<()> {
    std::fs::copy(link, target)
        .map(|_| ())
        .map_err(|e| SparkleError::io(format!("copying {}", link.display()), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn zip_names(path: &Path) -> Vec<String> {
        let archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        archive.file_names().map(String::from).collect()
    }

    #[tokio::test]
    async fn compress_directory_keeps_its_name() {
        let temp = TempDir::new().unwrap();
        let build = temp.path().join("output").join("build");
        std::fs::create_dir_all(build.join("shaders")).unwrap();
        std::fs::write(build.join("sparkle"), b"elf").unwrap();
        std::fs::write(build.join("shaders/main.spv"), b"spv").unwrap();

        let dest = temp.path().join("output").join("product.zip");
        compress(&build, &dest).await.unwrap();

        let names = zip_names(&dest);
        assert!(names.iter().any(|n| n == "build/sparkle"));
        assert!(names.iter().any(|n| n == "build/shaders/main.spv"));
    }

    #[tokio::test]
    async fn compress_replaces_existing_archive() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.txt");
        std::fs::write(&src, b"a").unwrap();
        let dest = temp.path().join("out.zip");
        std::fs::write(&dest, b"stale garbage").unwrap();

        compress(&src, &dest).await.unwrap();
        assert_eq!(zip_names(&dest), vec!["a.txt".to_string()]);
    }

    #[tokio::test]
    async fn compressed_directory_extracts_back() {
        let temp = TempDir::new().unwrap();
        let bundle = temp.path().join("sparkle.app");
        std::fs::create_dir_all(bundle.join("Contents/MacOS")).unwrap();
        std::fs::write(bundle.join("Contents/MacOS/sparkle"), b"macho").unwrap();

        let dest = temp.path().join("product.zip");
        compress(&bundle, &dest).await.unwrap();

        let out = temp.path().join("unpacked");
        crate::archive::extract(&dest, &out).await.unwrap();
        assert_eq!(
            std::fs::read(out.join("sparkle.app/Contents/MacOS/sparkle")).unwrap(),
            b"macho"
        );
    }

    #[tokio::test]
    async fn copy_dir_recursive() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        std::fs::create_dir_all(src.join("nested")).unwrap();
        std::fs::write(src.join("nested/file.txt"), b"data").unwrap();

        let dest = temp.path().join("dest");
        copy_dir(&src, &dest).await.unwrap();
        assert_eq!(std::fs::read(dest.join("nested/file.txt")).unwrap(), b"data");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn copy_dir_preserves_symlinks() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("Framework");
        std::fs::create_dir_all(src.join("Versions/A")).unwrap();
        std::os::unix::fs::symlink("A", src.join("Versions/Current")).unwrap();

        let dest = temp.path().join("copy");
        copy_dir(&src, &dest).await.unwrap();

        let link = dest.join("Versions/Current");
        assert!(link.symlink_metadata().unwrap().file_type().is_symlink());
        assert_eq!(std::fs::read_link(link).unwrap(), PathBuf::from("A"));
    }
}
