//! Archive codec and filesystem helpers
//!
//! - [`extract`]: zip / tar.gz / tar.xz / tar.bz2, format chosen by suffix
//! - [`compress`]: zip a file or directory
//! - [`copy_dir`]: recursive copy preserving symlinks
//! - [`robust_remove`]: bounded-retry tree removal that clears read-only bits
//!
//! Extraction refuses archives containing absolute paths or `..` segments
//! before anything is written.

mod compress;
mod extract;
mod remove;

pub use compress::{compress, copy_dir};
pub use extract::{extract, is_safe_entry_path};
pub use remove::{make_writable, robust_remove, robust_remove_with, RemovePolicy};

use std::path::Path;

/// Supported archive formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
    TarXz,
    TarBz2,
}

impl ArchiveFormat {
    /// Pick the format from the file name suffix
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        if name.ends_with(".zip") {
            Some(Self::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            Some(Self::TarXz)
        } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") {
            Some(Self::TarBz2)
        } else {
            None
        }
    }
}
