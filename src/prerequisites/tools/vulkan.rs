//! Vulkan SDK
//!
//! Besides locating the SDK this wires the loader environment for child
//! processes: `VULKAN_SDK`, `VK_LAYER_PATH` and on macOS `VK_ICD_FILENAMES`
//! pointing at MoltenVK.

use super::{fetch_and_extract, hoist_contents, mark_executable, Installation, Tool};
use crate::archive::robust_remove;
use crate::error::{SparkleError, SparkleResult};
use crate::platform::{Arch, Host, HostOs};
use crate::prerequisites::{ResolveContext, ToolKind};
use crate::process::{CommandLine, ToolEnv};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const INSTALLER_ARGS: [&str; 5] = [
    "install",
    "com.lunarg.vulkan.core",
    "--accept-licenses",
    "--default-answer",
    "--confirm-command",
];

pub struct VulkanSdk {
    version: String,
}

impl VulkanSdk {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
        }
    }

    /// Download URL for a host
    pub fn download_url(&self, host: Host) -> Option<String> {
        let v = &self.version;
        let (platform, file) = match (host.os, host.arch) {
            (HostOs::Linux, Arch::X86_64) => ("linux", format!("vulkansdk-linux-x86_64-{}.tar.xz", v)),
            (HostOs::MacOS, _) => ("mac", format!("vulkansdk-macos-{}.zip", v)),
            (HostOs::Windows, Arch::X86_64) => ("windows", format!("vulkansdk-windows-X64-{}.exe", v)),
            _ => return None,
        };
        Some(format!("https://sdk.lunarg.com/sdk/download/{}/{}/{}", v, platform, file))
    }

    fn header(root: &Path) -> PathBuf {
        root.join("include").join("vulkan").join("vulkan.h")
    }

    /// Linux tarball: `<version>/x86_64/*` becomes the SDK root
    async fn install_linux(&self, cx: &ResolveContext, url: &str, staging: &Path) -> SparkleResult<()> {
        let unpacked = staging.join(".unpacked");
        fetch_and_extract(cx, url, "VulkanSDK", &unpacked).await?;

        let arch_dir = unpacked.join(&self.version).join("x86_64");
        if !arch_dir.is_dir() {
            return Err(SparkleError::Extract {
                archive: PathBuf::from(url),
                reason: format!("expected {}/x86_64 inside the archive", self.version),
            });
        }
        hoist_contents(&arch_dir, staging).await?;
        robust_remove(&unpacked).await
    }

    /// macOS zip wraps an installer app that is run headless
    async fn install_macos(&self, cx: &ResolveContext, url: &str, staging: &Path) -> SparkleResult<()> {
        let scratch = tempfile::tempdir_in(cx.cache.root())
            .map_err(|e| SparkleError::io("creating installer scratch directory", e))?;
        fetch_and_extract(cx, url, "VulkanSDK", scratch.path()).await?;

        let app = format!("vulkansdk-macOS-{}", self.version);
        let installer = scratch
            .path()
            .join(format!("{}.app", app))
            .join("Contents")
            .join("MacOS")
            .join(&app);
        mark_executable(&installer).await?;

        self.run_installer(cx, &installer, staging).await
    }

    async fn install_windows(&self, cx: &ResolveContext, url: &str, staging: &Path) -> SparkleResult<()> {
        let installer = cx.download(url, "VulkanSDK").await?;
        let result = self.run_installer(cx, &installer, staging).await;
        let _ = tokio::fs::remove_file(&installer).await;
        result
    }

    async fn run_installer(&self, cx: &ResolveContext, installer: &Path, staging: &Path) -> SparkleResult<()> {
        // The installer creates its target root itself
        let _ = tokio::fs::remove_dir(staging).await;

        let cmd = CommandLine::new(installer)
            .args(&INSTALLER_ARGS[..2])
            .arg("--root")
            .arg(staging)
            .args(&INSTALLER_ARGS[2..]);
        cx.run_install_step(cmd, "Installing Vulkan SDK core").await
    }
}

#[async_trait]
impl Tool for VulkanSdk {
    fn kind(&self) -> ToolKind {
        ToolKind::VulkanSdk
    }

    fn version(&self) -> Option<&str> {
        Some(&self.version)
    }

    /// `include/vulkan/vulkan.h` under the root, or on macOS under `macOS/`
    /// which then becomes the effective root
    fn validate(&self, root: &Path, host: Host) -> Option<Installation> {
        let header = Self::header(root);
        if header.is_file() {
            return Some(Installation::new(root, header));
        }
        if host.is_macos() {
            let nested = root.join("macOS");
            let header = Self::header(&nested);
            if header.is_file() {
                info!("Using Vulkan SDK at {}", nested.display());
                return Some(Installation::new(nested, header));
            }
        }
        None
    }

    fn can_install(&self, host: Host) -> bool {
        self.download_url(host).is_some()
    }

    async fn install(&self, cx: &ResolveContext, staging: &Path) -> SparkleResult<()> {
        let url = self
            .download_url(cx.host)
            .ok_or_else(|| SparkleError::tool_not_found("Vulkan SDK", self.hint(cx.host)))?;
        info!("Installing Vulkan SDK {}", self.version);

        match cx.host.os {
            HostOs::Linux => self.install_linux(cx, &url, staging).await,
            HostOs::MacOS => self.install_macos(cx, &url, staging).await,
            _ => self.install_windows(cx, &url, staging).await,
        }
    }

    fn environment(&self, install: &Installation, cx: &ResolveContext) -> ToolEnv {
        let separator = cx.host.os.path_separator();
        let root = &install.root;
        let mut env = ToolEnv::new();
        env.set("VULKAN_SDK", root.to_string_lossy());

        let layers = root.join("share").join("vulkan").join("explicit_layer.d");
        if layers.is_dir() {
            env.prepend_list("VK_LAYER_PATH", &layers.to_string_lossy(), separator, cx.var("VK_LAYER_PATH"));
        } else {
            warn!("Validation layer directory not found at {}", layers.display());
        }

        if cx.host.is_macos() {
            let icd = root
                .join("share")
                .join("vulkan")
                .join("icd.d")
                .join("MoltenVK_icd.json");
            if icd.is_file() {
                env.prepend_list("VK_ICD_FILENAMES", &icd.to_string_lossy(), separator, cx.var("VK_ICD_FILENAMES"));
            } else {
                warn!("MoltenVK ICD file not found at {}", icd.display());
            }
        }

        env
    }

    fn hint(&self, host: Host) -> String {
        let mut hint = format!(
            "Download Vulkan SDK {} from https://vulkan.lunarg.com/sdk/home and set VULKAN_SDK",
            self.version
        );
        if host.is_windows() {
            hint.push_str(" (the installer may need an administrator prompt)");
        }
        hint
    }
}
