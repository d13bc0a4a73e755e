//! CMake

use super::{bin_in, fetch_and_extract, hoist_single_dir, is_executable, parse_version, Installation, Tool};
use crate::error::SparkleResult;
use crate::platform::{Arch, Host, HostOs};
use crate::prerequisites::{ResolveContext, ToolKind};
use crate::process::{probe, CommandLine, PROBE_TIMEOUT};
use async_trait::async_trait;
use semver::Version;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct Cmake {
    version: String,
    minimum: String,
}

impl Cmake {
    pub fn new(version: &str, minimum: &str) -> Self {
        Self {
            version: version.to_string(),
            minimum: minimum.to_string(),
        }
    }

    /// Release artifact name for a host, if Kitware publishes one
    pub fn artifact(&self, host: Host) -> Option<String> {
        let platform = match (host.os, host.arch) {
            (HostOs::Linux, Arch::X86_64) => "linux-x86_64",
            (HostOs::Linux, Arch::Aarch64) => "linux-aarch64",
            (HostOs::MacOS, _) => "macos-universal",
            (HostOs::Windows, Arch::X86_64) => "windows-x86_64",
            _ => return None,
        };
        let ext = if host.is_windows() { "zip" } else { "tar.gz" };
        Some(format!("cmake-{}-{}.{}", self.version, platform, ext))
    }

    fn minimum(&self) -> Version {
        parse_version(&self.minimum).unwrap_or_else(|| Version::new(3, 24, 0))
    }

    /// Check a PATH hit against the minimum version
    async fn probe_version(&self, cmake: &Path) -> Option<Version> {
        let output = probe(&CommandLine::new(cmake).arg("--version"), PROBE_TIMEOUT)
            .await
            .ok()?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout.lines().next().and_then(parse_version)
    }
}

fn install_for(path: PathBuf) -> Installation {
    let root = path
        .parent()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| path.clone());
    Installation::new(root, path)
}

#[async_trait]
impl Tool for Cmake {
    fn kind(&self) -> ToolKind {
        ToolKind::Cmake
    }

    fn version(&self) -> Option<&str> {
        Some(&self.version)
    }

    fn validate(&self, root: &Path, host: Host) -> Option<Installation> {
        if let Some(path) = bin_in(root, host, "cmake") {
            return Some(Installation::new(root, path));
        }
        let bundle = root.join("CMake.app").join("Contents");
        bin_in(&bundle, host, "cmake").map(|path| Installation::new(bundle, path))
    }

    /// `CMAKE_PATH` may name the executable or the directory holding it
    fn check_override(&self, value: &Path, host: Host) -> Option<Installation> {
        if is_executable(value) {
            return Some(install_for(value.to_path_buf()));
        }
        let direct = value.join(host.os.exe("cmake"));
        if is_executable(&direct) {
            return Some(install_for(direct));
        }
        self.validate(value, host)
    }

    async fn locate_system(&self, cx: &ResolveContext) -> Option<Installation> {
        let mut candidates: Vec<PathBuf> = cx.which("cmake").into_iter().collect();
        if cx.host.is_macos() {
            candidates.push(PathBuf::from("/Applications/CMake.app/Contents/bin/cmake"));
        }

        let minimum = self.minimum();
        for candidate in candidates.into_iter().filter(|c| is_executable(c)) {
            match self.probe_version(&candidate).await {
                Some(found) if found >= minimum => {
                    debug!("CMake {} at {}", found, candidate.display());
                    return Some(install_for(candidate));
                }
                Some(found) => warn!(
                    "CMake {} at {} is older than the required {}",
                    found,
                    candidate.display(),
                    minimum
                ),
                None => warn!("Could not determine the version of {}", candidate.display()),
            }
        }
        None
    }

    async fn install_with_package_manager(&self, cx: &ResolveContext) -> bool {
        cx.host.is_macos()
            && cx
                .package_manager_install(CommandLine::new("brew").args(["install", "cmake"]), "CMake")
                .await
    }

    fn can_install(&self, host: Host) -> bool {
        self.artifact(host).is_some()
    }

    async fn install(&self, cx: &ResolveContext, staging: &Path) -> SparkleResult<()> {
        let artifact = self
            .artifact(cx.host)
            .ok_or_else(|| crate::error::SparkleError::tool_not_found("CMake", self.hint(cx.host)))?;
        let url = format!(
            "https://github.com/Kitware/CMake/releases/download/v{}/{}",
            self.version, artifact
        );
        fetch_and_extract(cx, &url, "cmake", staging).await?;
        hoist_single_dir(staging).await
    }

    fn hint(&self, _host: Host) -> String {
        format!(
            "Install CMake {} or newer from https://cmake.org/download/, or set CMAKE_PATH",
            self.minimum
        )
    }
}
