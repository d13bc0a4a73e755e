//! Prerequisite resolution
//!
//! Every external tool the build needs is resolved through one fallback
//! chain (override variable, version-pinned cache, system search, package
//! manager, official download) and collected into an immutable
//! [`Toolchain`]. Environment a tool needs is carried in the toolchain's
//! [`ToolEnv`] and applied to child processes only.

mod cache;
pub(crate) mod context;
mod fetch;
pub mod gradle;
mod manifest;
mod resolver;
pub mod tools;

pub use cache::ToolCache;
pub use context::{process_env, EnvLookup, ResolveContext};
pub use fetch::{DownloadRequest, Fetcher, HttpFetcher};
pub use manifest::VersionManifest;
pub use resolver::Resolver;
pub use tools::{Installation, Tool};

use crate::error::{SparkleError, SparkleResult};
use crate::process::ToolEnv;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Every tool the resolver knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ToolKind {
    Cmake,
    Ninja,
    Llvm,
    VisualStudio,
    Vcpkg,
    VulkanSdk,
    Slang,
    Jdk,
    AndroidValidationLayers,
}

impl ToolKind {
    /// Directory name under `build_cache/`
    pub fn cache_name(&self) -> &'static str {
        match self {
            ToolKind::Cmake => "cmake",
            ToolKind::Ninja => "ninja",
            ToolKind::Llvm => "llvm",
            ToolKind::VisualStudio => "visual-studio",
            ToolKind::Vcpkg => "vcpkg",
            ToolKind::VulkanSdk => "VulkanSDK",
            ToolKind::Slang => "slang",
            ToolKind::Jdk => "jdk",
            ToolKind::AndroidValidationLayers => "android-validation-layers",
        }
    }

    /// Environment variable that overrides discovery
    pub fn override_var(&self) -> Option<&'static str> {
        match self {
            ToolKind::Cmake => Some("CMAKE_PATH"),
            ToolKind::Ninja => Some("NINJA_PATH"),
            ToolKind::Llvm => Some("LLVM"),
            ToolKind::VisualStudio => Some("VS_PATH"),
            ToolKind::Vcpkg => Some("VCPKG_PATH"),
            ToolKind::VulkanSdk => Some("VULKAN_SDK"),
            ToolKind::Slang => Some("SLANGC_PATH"),
            ToolKind::Jdk => Some("JAVA_HOME"),
            ToolKind::AndroidValidationLayers => None,
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ToolKind::Cmake => "CMake",
            ToolKind::Ninja => "Ninja",
            ToolKind::Llvm => "LLVM",
            ToolKind::VisualStudio => "Visual Studio 2022",
            ToolKind::Vcpkg => "vcpkg",
            ToolKind::VulkanSdk => "Vulkan SDK",
            ToolKind::Slang => "slangc",
            ToolKind::Jdk => "JDK 17",
            ToolKind::AndroidValidationLayers => "Android validation layers",
        };
        write!(f, "{}", name)
    }
}

/// Which step of the fallback chain produced a tool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    Override,
    Cache,
    System,
    PackageManager,
    Download,
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResolutionSource::Override => "override",
            ResolutionSource::Cache => "cache",
            ResolutionSource::System => "system",
            ResolutionSource::PackageManager => "package manager",
            ResolutionSource::Download => "download",
        };
        write!(f, "{}", name)
    }
}

/// A validated tool location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTool {
    pub kind: ToolKind,
    /// Pinned version, for versioned tools
    pub version: Option<String>,
    /// Installation root (SDK root, LLVM prefix, JAVA_HOME, ...)
    pub root: PathBuf,
    /// Primary file: the executable for single-binary tools
    pub path: PathBuf,
    pub source: ResolutionSource,
}

/// Resolved tools plus the child-process environment they require
#[derive(Debug, Clone, Default)]
pub struct Toolchain {
    tools: BTreeMap<ToolKind, ResolvedTool>,
    env: ToolEnv,
}

impl Toolchain {
    pub fn new(tools: BTreeMap<ToolKind, ResolvedTool>, env: ToolEnv) -> Self {
        Self { tools, env }
    }

    /// Look up a tool the builder declared as required
    pub fn get(&self, kind: ToolKind) -> SparkleResult<&ResolvedTool> {
        self.tools
            .get(&kind)
            .ok_or_else(|| SparkleError::Internal(format!("{} was not resolved for this build", kind)))
    }

    /// Primary path of a required tool
    pub fn path(&self, kind: ToolKind) -> SparkleResult<&Path> {
        self.get(kind).map(|t| t.path.as_path())
    }

    /// Installation root of a required tool
    pub fn root(&self, kind: ToolKind) -> SparkleResult<&Path> {
        self.get(kind).map(|t| t.root.as_path())
    }

    pub fn contains(&self, kind: ToolKind) -> bool {
        self.tools.contains_key(&kind)
    }

    pub fn env(&self) -> &ToolEnv {
        &self.env
    }

    pub fn tools(&self) -> impl Iterator<Item = &ResolvedTool> {
        self.tools.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(kind: ToolKind, path: &str) -> ResolvedTool {
        ResolvedTool {
            kind,
            version: None,
            root: PathBuf::from(path),
            path: PathBuf::from(path).join("bin"),
            source: ResolutionSource::System,
        }
    }

    #[test]
    fn override_vars() {
        assert_eq!(ToolKind::VulkanSdk.override_var(), Some("VULKAN_SDK"));
        assert_eq!(ToolKind::Jdk.override_var(), Some("JAVA_HOME"));
        assert_eq!(ToolKind::AndroidValidationLayers.override_var(), None);
    }

    #[test]
    fn toolchain_lookup() {
        let mut tools = BTreeMap::new();
        tools.insert(ToolKind::Ninja, resolved(ToolKind::Ninja, "/opt/ninja"));
        let toolchain = Toolchain::new(tools, ToolEnv::new());

        assert!(toolchain.contains(ToolKind::Ninja));
        assert_eq!(toolchain.root(ToolKind::Ninja).unwrap(), Path::new("/opt/ninja"));
        assert!(matches!(
            toolchain.get(ToolKind::Cmake),
            Err(SparkleError::Internal(_))
        ));
    }

    #[test]
    fn display_names() {
        assert_eq!(ToolKind::Jdk.to_string(), "JDK 17");
        assert_eq!(ResolutionSource::PackageManager.to_string(), "package manager");
    }
}
