//! Ninja

use super::{fetch_and_extract, is_executable, mark_executable, Installation, Tool};
use crate::error::{SparkleError, SparkleResult};
use crate::platform::{Arch, Host, HostOs};
use crate::prerequisites::{ResolveContext, ToolKind};
use async_trait::async_trait;
use std::path::Path;

pub struct Ninja {
    version: String,
}

impl Ninja {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
        }
    }

    pub fn artifact(&self, host: Host) -> Option<&'static str> {
        match (host.os, host.arch) {
            (HostOs::Linux, Arch::X86_64) => Some("ninja-linux.zip"),
            (HostOs::Linux, Arch::Aarch64) => Some("ninja-linux-aarch64.zip"),
            (HostOs::MacOS, _) => Some("ninja-mac.zip"),
            (HostOs::Windows, _) => Some("ninja-win.zip"),
            _ => None,
        }
    }
}

#[async_trait]
impl Tool for Ninja {
    fn kind(&self) -> ToolKind {
        ToolKind::Ninja
    }

    fn version(&self) -> Option<&str> {
        Some(&self.version)
    }

    fn validate(&self, root: &Path, host: Host) -> Option<Installation> {
        let path = root.join(host.os.exe("ninja"));
        is_executable(&path).then(|| Installation::new(root, path))
    }

    fn check_override(&self, value: &Path, host: Host) -> Option<Installation> {
        if is_executable(value) {
            let root = value.parent().unwrap_or(value);
            return Some(Installation::new(root, value));
        }
        self.validate(value, host)
    }

    async fn locate_system(&self, cx: &ResolveContext) -> Option<Installation> {
        let path = cx.which("ninja")?;
        let root = path.parent()?.to_path_buf();
        Some(Installation::new(root, path))
    }

    fn can_install(&self, host: Host) -> bool {
        self.artifact(host).is_some()
    }

    async fn install(&self, cx: &ResolveContext, staging: &Path) -> SparkleResult<()> {
        let artifact = self
            .artifact(cx.host)
            .ok_or_else(|| SparkleError::tool_not_found("Ninja", self.hint(cx.host)))?;
        let url = format!(
            "https://github.com/ninja-build/ninja/releases/download/v{}/{}",
            self.version, artifact
        );
        fetch_and_extract(cx, &url, "ninja", staging).await?;

        let exe = staging.join(cx.host.os.exe("ninja"));
        if exe.exists() {
            mark_executable(&exe).await?;
        }
        Ok(())
    }

    fn hint(&self, _host: Host) -> String {
        "Install Ninja from https://github.com/ninja-build/ninja/releases or set NINJA_PATH".to_string()
    }
}
