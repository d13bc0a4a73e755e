//! Archive extraction

use super::remove::clear_readonly;
use super::ArchiveFormat;
use crate::error::{SparkleError, SparkleResult};
use async_compression::tokio::bufread::{BzDecoder, GzipDecoder, XzDecoder};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWriteExt, BufReader};
use tracing::{debug, info};

/// Extract `archive` into `dest`, creating `dest` if needed
pub async fn extract(archive: &Path, dest: &Path) -> SparkleResult<()> {
    let format =
        ArchiveFormat::from_path(archive).ok_or_else(|| SparkleError::UnsupportedArchive(archive.to_path_buf()))?;

    info!("Extracting {} to {}", archive.display(), dest.display());

    tokio::fs::create_dir_all(dest)
        .await
        .map_err(|e| SparkleError::io(format!("creating {}", dest.display()), e))?;

    match format {
        ArchiveFormat::Zip => {
            let archive = archive.to_path_buf();
            let dest = dest.to_path_buf();
            blocking(move || extract_zip(&archive, &dest)).await
        }
        ArchiveFormat::TarGz | ArchiveFormat::TarXz | ArchiveFormat::TarBz2 => {
            extract_compressed_tar(archive, dest, format).await
        }
    }
}

/// Whether an archive entry name stays inside the extraction root.
///
/// Rejects absolute paths (unix or Windows style, including drive letters)
/// and any `..` segment regardless of separator.
pub fn is_safe_entry_path(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    if name.starts_with('/') || name.starts_with('\\') {
        return false;
    }
    let bytes = name.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        return false;
    }
    !name.split(['/', '\\']).any(|segment| segment == "..")
}

async fn blocking<F>(f: F) -> SparkleResult<()>
where
    F: FnOnce() -> SparkleResult<()> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SparkleError::Internal(format!("extraction task failed: {}", e)))?
}

fn extract_error(archive: &Path, reason: impl ToString) -> SparkleError {
    SparkleError::Extract {
        archive: archive.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn unsafe_entry(archive: &Path, entry: impl Into<String>) -> SparkleError {
    SparkleError::UnsafeArchiveEntry {
        archive: archive.to_path_buf(),
        entry: entry.into(),
    }
}

/// Link targets follow the entry-name rules: relative, no `..`
fn check_link_target(archive: &Path, entry: &str, target: &str) -> SparkleResult<()> {
    if is_safe_entry_path(target) {
        Ok(())
    } else {
        Err(unsafe_entry(archive, format!("{} -> {}", entry, target)))
    }
}

/// Refuse entries whose parent directories under `dest` are symlinks
fn check_no_symlink_parent(archive: &Path, dest: &Path, relative: &Path) -> SparkleResult<()> {
    let mut current = dest.to_path_buf();
    let Some(parent) = relative.parent() else {
        return Ok(());
    };
    for component in parent.components() {
        current.push(component);
        match current.symlink_metadata() {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(unsafe_entry(archive, relative.to_string_lossy()));
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }
    Ok(())
}

/// Make an existing destination entry writable so it can be overwritten;
/// an existing symlink is removed rather than followed
fn prepare_target(path: &Path) -> SparkleResult<()> {
    let Ok(meta) = path.symlink_metadata() else {
        return Ok(());
    };
    if meta.file_type().is_symlink() {
        std::fs::remove_file(path).map_err(|e| SparkleError::io(format!("replacing {}", path.display()), e))
    } else {
        clear_readonly(path).map_err(|e| SparkleError::io(format!("making {} writable", path.display()), e))
    }
}

fn extract_zip(archive_path: &Path, dest: &Path) -> SparkleResult<()> {
    let file = File::open(archive_path)
        .map_err(|e| SparkleError::io(format!("opening {}", archive_path.display()), e))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| extract_error(archive_path, e))?;

    // Validate every entry and link target before writing anything
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| extract_error(archive_path, e))?;
        let name = entry.name().to_string();
        if !is_safe_entry_path(&name) {
            return Err(unsafe_entry(archive_path, name));
        }
        if entry.is_symlink() {
            let mut target = String::new();
            io::Read::read_to_string(&mut entry, &mut target).map_err(|e| extract_error(archive_path, e))?;
            check_link_target(archive_path, &name, &target)?;
        }
    }

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| extract_error(archive_path, e))?;

        let relative = entry
            .enclosed_name()
            .ok_or_else(|| unsafe_entry(archive_path, entry.name()))?;
        check_no_symlink_parent(archive_path, dest, &relative)?;
        let outpath = dest.join(relative);

        if entry.is_dir() {
            prepare_target(&outpath)?;
            std::fs::create_dir_all(&outpath)
                .map_err(|e| SparkleError::io(format!("creating {}", outpath.display()), e))?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SparkleError::io(format!("creating {}", parent.display()), e))?;
        }
        prepare_target(&outpath)?;

        #[cfg(unix)]
        if entry.is_symlink() {
            let mut target = String::new();
            io::Read::read_to_string(&mut entry, &mut target).map_err(|e| extract_error(archive_path, e))?;
            if outpath.symlink_metadata().is_ok() {
                std::fs::remove_file(&outpath)
                    .map_err(|e| SparkleError::io(format!("replacing {}", outpath.display()), e))?;
            }
            std::os::unix::fs::symlink(&target, &outpath)
                .map_err(|e| SparkleError::io(format!("linking {}", outpath.display()), e))?;
            continue;
        }

        let mut outfile = File::create(&outpath)
            .map_err(|e| SparkleError::io(format!("creating {}", outpath.display()), e))?;
        io::copy(&mut entry, &mut outfile).map_err(|e| extract_error(archive_path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode & 0o7777)).ok();
            }
        }
    }

    debug!("Extracted {} zip entries", archive.len());
    Ok(())
}

async fn extract_compressed_tar(archive: &Path, dest: &Path, format: ArchiveFormat) -> SparkleResult<()> {
    // Decompress into a scratch tar first; the tar reader is synchronous
    let scratch = tempfile::tempdir().map_err(|e| SparkleError::io("creating scratch directory", e))?;
    let tar_path = scratch.path().join("archive.tar");

    {
        let input = tokio::fs::File::open(archive)
            .await
            .map_err(|e| SparkleError::io(format!("opening {}", archive.display()), e))?;
        let mut output = tokio::fs::File::create(&tar_path)
            .await
            .map_err(|e| SparkleError::io("creating scratch tar", e))?;
        let reader = BufReader::new(input);

        let copied = match format {
            ArchiveFormat::TarGz => tokio::io::copy(&mut GzipDecoder::new(reader), &mut output).await,
            ArchiveFormat::TarXz => tokio::io::copy(&mut XzDecoder::new(reader), &mut output).await,
            ArchiveFormat::TarBz2 => tokio::io::copy(&mut BzDecoder::new(reader), &mut output).await,
            ArchiveFormat::Zip => return Err(SparkleError::Internal("zip routed to tar decoder".to_string())),
        };
        copied.map_err(|e| extract_error(archive, format!("decompression failed: {}", e)))?;
        output.flush().await.map_err(|e| SparkleError::io("flushing scratch tar", e))?;
    }

    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();
    let result = blocking(move || extract_tar(&archive, &tar_path, &dest)).await;

    drop(scratch);
    result
}

fn tar_entries<F>(archive: &Path, tar_path: &Path, mut visit: F) -> SparkleResult<()>
where
    F: FnMut(tar::Entry<'_, File>, PathBuf) -> SparkleResult<()>,
{
    let file = File::open(tar_path).map_err(|e| SparkleError::io("opening scratch tar", e))?;
    let mut tar = tar::Archive::new(file);
    let entries = tar.entries().map_err(|e| extract_error(archive, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| extract_error(archive, e))?;
        let raw = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        if !is_safe_entry_path(&raw) {
            return Err(unsafe_entry(archive, raw));
        }
        let kind = entry.header().entry_type();
        if kind.is_symlink() || kind.is_hard_link() {
            let target = entry
                .link_name_bytes()
                .map(|t| String::from_utf8_lossy(&t).into_owned())
                .unwrap_or_default();
            check_link_target(archive, &raw, &target)?;
        }
        visit(entry, PathBuf::from(raw))?;
    }
    Ok(())
}

fn extract_tar(archive: &Path, tar_path: &Path, dest: &Path) -> SparkleResult<()> {
    // First pass only validates entry names and link targets
    tar_entries(archive, tar_path, |_, _| Ok(()))?;

    let mut count = 0usize;
    tar_entries(archive, tar_path, |mut entry, relative| {
        check_no_symlink_parent(archive, dest, &relative)?;
        prepare_target(&dest.join(&relative))?;
        // unpack_in refuses to write through links that leave `dest`
        if !entry.unpack_in(dest).map_err(|e| extract_error(archive, e))? {
            return Err(unsafe_entry(archive, relative.to_string_lossy()));
        }
        count += 1;
        Ok(())
    })?;

    debug!("Extracted {} tar entries", count);
    Ok(())
}
