//! Prebuilt Khronos validation layers for Android devices

use super::{fetch_and_extract, hoist_single_dir, Installation, Tool};
use crate::error::SparkleResult;
use crate::platform::Host;
use crate::prerequisites::{ResolveContext, ToolKind};
use async_trait::async_trait;
use std::path::Path;

/// Shared library each ABI directory must hold
pub const VALIDATION_LAYER_LIB: &str = "libVkLayer_khronos_validation.so";

/// `<abi>/libVkLayer_khronos_validation.so` trees, released alongside each
/// Vulkan SDK version
pub struct AndroidValidationLayers {
    version: String,
}

impl AndroidValidationLayers {
    pub fn new(vulkan_version: &str) -> Self {
        Self {
            version: vulkan_version.to_string(),
        }
    }

    pub fn download_url(&self) -> String {
        format!(
            "https://github.com/KhronosGroup/Vulkan-ValidationLayers/releases/download/vulkan-sdk-{v}/android-binaries-{v}.zip",
            v = self.version
        )
    }
}

#[async_trait]
impl Tool for AndroidValidationLayers {
    fn kind(&self) -> ToolKind {
        ToolKind::AndroidValidationLayers
    }

    fn version(&self) -> Option<&str> {
        Some(&self.version)
    }

    fn validate(&self, root: &Path, _host: Host) -> Option<Installation> {
        let entries = std::fs::read_dir(root).ok()?;
        entries
            .filter_map(Result::ok)
            .map(|entry| entry.path().join(VALIDATION_LAYER_LIB))
            .find(|lib| lib.is_file())
            .map(|lib| Installation::new(root, lib))
    }

    fn can_install(&self, _host: Host) -> bool {
        true
    }

    async fn install(&self, cx: &ResolveContext, staging: &Path) -> SparkleResult<()> {
        fetch_and_extract(cx, &self.download_url(), "android-validation-layers", staging).await?;
        hoist_single_dir(staging).await
    }

    fn hint(&self, _host: Host) -> String {
        format!(
            "Download {} and unpack its ABI directories into app/src/main/jniLibs",
            self.download_url()
        )
    }
}
