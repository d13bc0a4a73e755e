//! Per-tool detection and install strategies

mod cmake;
mod jdk;
mod llvm;
mod ninja;
mod slang;
mod validation_layers;
mod vcpkg;
mod visual_studio;
mod vulkan;

pub use cmake::Cmake;
pub use jdk::Jdk;
pub use llvm::Llvm;
pub use ninja::Ninja;
pub use slang::Slang;
pub use validation_layers::{AndroidValidationLayers, VALIDATION_LAYER_LIB};
pub use vcpkg::Vcpkg;
pub use visual_studio::VisualStudio;
pub use vulkan::VulkanSdk;

use super::{ResolveContext, ToolKind, VersionManifest};
use crate::error::{SparkleError, SparkleResult};
use crate::platform::Host;
use crate::process::ToolEnv;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// An installation that passed a tool's validity predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    /// Effective root (may be a subdirectory of the probed path)
    pub root: PathBuf,
    /// Primary file inside the root
    pub path: PathBuf,
}

impl Installation {
    pub fn new(root: impl Into<PathBuf>, path: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            path: path.into(),
        }
    }
}

/// Detection and installation strategy for one tool.
///
/// The resolver owns the fallback order; a tool only answers the questions
/// each step asks.
#[async_trait]
pub trait Tool: Send + Sync {
    fn kind(&self) -> ToolKind;

    /// Pinned version, `None` for tools cached without a version
    fn version(&self) -> Option<&str>;

    /// Validity predicate for a candidate root
    fn validate(&self, root: &Path, host: Host) -> Option<Installation>;

    /// Interpret the override variable's value
    fn check_override(&self, value: &Path, host: Host) -> Option<Installation> {
        self.validate(value, host)
    }

    /// System PATH and well-known install locations
    async fn locate_system(&self, _cx: &ResolveContext) -> Option<Installation> {
        None
    }

    /// Try an OS package manager; `true` means the system search is worth repeating
    async fn install_with_package_manager(&self, _cx: &ResolveContext) -> bool {
        false
    }

    /// Whether [`Tool::install`] can provision this tool on `host`
    fn can_install(&self, _host: Host) -> bool {
        false
    }

    /// Populate `staging` with a complete installation
    async fn install(&self, _cx: &ResolveContext, _staging: &Path) -> SparkleResult<()> {
        Err(SparkleError::Internal(format!(
            "{} has no automatic installation",
            self.kind()
        )))
    }

    /// Environment a validated installation contributes to child processes
    fn environment(&self, _install: &Installation, _cx: &ResolveContext) -> ToolEnv {
        ToolEnv::new()
    }

    /// Remediation shown when every strategy fails
    fn hint(&self, host: Host) -> String;
}

/// Build the strategy for a tool kind, pinned to the manifest's versions
pub fn for_kind(kind: ToolKind, manifest: &VersionManifest) -> Box<dyn Tool> {
    match kind {
        ToolKind::Cmake => Box::new(Cmake::new(&manifest.cmake, &manifest.cmake_minimum)),
        ToolKind::Ninja => Box::new(Ninja::new(&manifest.ninja)),
        ToolKind::Llvm => Box::new(Llvm),
        ToolKind::VisualStudio => Box::new(VisualStudio),
        ToolKind::Vcpkg => Box::new(Vcpkg),
        ToolKind::VulkanSdk => Box::new(VulkanSdk::new(&manifest.vulkan_sdk)),
        ToolKind::Slang => Box::new(Slang::new(&manifest.slang)),
        ToolKind::Jdk => Box::new(Jdk),
        ToolKind::AndroidValidationLayers => Box::new(AndroidValidationLayers::new(&manifest.vulkan_sdk)),
    }
}

/// A regular file with an executable bit (any file on Windows)
pub fn is_executable(path: &Path) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }

    #[cfg(not(unix))]
    {
        true
    }
}

/// `<root>/bin/<program>` if it is executable
pub fn bin_in(root: &Path, host: Host, program: &str) -> Option<PathBuf> {
    let path = root.join("bin").join(host.os.exe(program));
    is_executable(&path).then_some(path)
}

/// Set `rwxr-xr-x` on an extracted binary
pub async fn mark_executable(path: &Path) -> SparkleResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
            .await
            .map_err(|e| SparkleError::io(format!("marking {} executable", path.display()), e))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

/// Move the contents of a lone top-level directory up into `dir`.
///
/// Release archives usually wrap everything in `<name>-<version>/`. Does
/// nothing if `dir` holds anything besides that one directory.
pub async fn hoist_single_dir(dir: &Path) -> SparkleResult<()> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| SparkleError::io(format!("reading {}", dir.display()), e))?;

    let mut children = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| SparkleError::io(format!("reading {}", dir.display()), e))?
    {
        children.push(entry.path());
    }

    let [only] = children.as_slice() else {
        return Ok(());
    };
    if !only.is_dir() {
        return Ok(());
    }

    // Step aside first so a child sharing the wrapper's name can move up
    let aside = dir.join(format!(".hoist-{}", uuid::Uuid::new_v4().simple()));
    tokio::fs::rename(only, &aside)
        .await
        .map_err(|e| SparkleError::io(format!("moving {}", only.display()), e))?;

    hoist_contents(&aside, dir).await?;
    tokio::fs::remove_dir(&aside)
        .await
        .map_err(|e| SparkleError::io(format!("removing {}", aside.display()), e))
}

/// Move every entry of `from` into `to`, replacing same-named entries
pub async fn hoist_contents(from: &Path, to: &Path) -> SparkleResult<()> {
    let mut entries = tokio::fs::read_dir(from)
        .await
        .map_err(|e| SparkleError::io(format!("reading {}", from.display()), e))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| SparkleError::io(format!("reading {}", from.display()), e))?
    {
        let target = to.join(entry.file_name());
        if tokio::fs::symlink_metadata(&target).await.is_ok() {
            crate::archive::robust_remove(&target).await?;
        }
        tokio::fs::rename(entry.path(), &target)
            .await
            .map_err(|e| SparkleError::io(format!("moving {}", entry.path().display()), e))?;
    }
    Ok(())
}

/// Download a release archive and unpack it into `staging`.
///
/// The archive is deleted afterwards whether or not extraction succeeded.
pub async fn fetch_and_extract(cx: &ResolveContext, url: &str, tool_key: &str, staging: &Path) -> SparkleResult<()> {
    let archive = cx.download(url, tool_key).await?;
    let result = crate::archive::extract(&archive, staging).await;
    let _ = tokio::fs::remove_file(&archive).await;
    result
}

/// Lenient version parse: the first token starting with a digit, padded
/// to three components (`3.28` becomes `3.28.0`)
pub fn parse_version(text: &str) -> Option<semver::Version> {
    let token = text
        .split_whitespace()
        .find(|t| t.starts_with(|c: char| c.is_ascii_digit()))?;
    let numeric: String = token
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let mut parts: Vec<&str> = numeric.split('.').filter(|p| !p.is_empty()).take(3).collect();
    while parts.len() < 3 {
        parts.push("0");
    }
    semver::Version::parse(&parts.join(".")).ok()
}
