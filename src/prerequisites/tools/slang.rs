//! Slang shader compiler

use super::{bin_in, fetch_and_extract, is_executable, mark_executable, Installation, Tool};
use crate::error::{SparkleError, SparkleResult};
use crate::platform::{Arch, Host, HostOs};
use crate::prerequisites::{ResolveContext, ToolKind};
use crate::process::ToolEnv;
use async_trait::async_trait;
use std::path::Path;

pub struct Slang {
    version: String,
}

impl Slang {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
        }
    }

    pub fn artifact(&self, host: Host) -> Option<String> {
        let os = match host.os {
            HostOs::Windows => "windows",
            HostOs::MacOS => "macos",
            HostOs::Linux => "linux",
            HostOs::Unsupported => return None,
        };
        let arch = match host.arch {
            Arch::X86_64 => "x86_64",
            Arch::Aarch64 => "aarch64",
            Arch::Unsupported => return None,
        };
        Some(format!("slang-{}-{}-{}.zip", self.version, os, arch))
    }
}

#[async_trait]
impl Tool for Slang {
    fn kind(&self) -> ToolKind {
        ToolKind::Slang
    }

    fn version(&self) -> Option<&str> {
        Some(&self.version)
    }

    fn validate(&self, root: &Path, host: Host) -> Option<Installation> {
        bin_in(root, host, "slangc").map(|path| Installation::new(root, path))
    }

    /// `SLANGC_PATH` names the compiler itself or an install root
    fn check_override(&self, value: &Path, host: Host) -> Option<Installation> {
        if is_executable(value) {
            let root = value.parent().and_then(Path::parent).unwrap_or(value);
            return Some(Installation::new(root, value));
        }
        self.validate(value, host)
    }

    async fn locate_system(&self, cx: &ResolveContext) -> Option<Installation> {
        let path = cx.which("slangc")?;
        let root = path.parent().and_then(Path::parent)?.to_path_buf();
        Some(Installation::new(root, path))
    }

    fn can_install(&self, host: Host) -> bool {
        self.artifact(host).is_some()
    }

    async fn install(&self, cx: &ResolveContext, staging: &Path) -> SparkleResult<()> {
        let artifact = self
            .artifact(cx.host)
            .ok_or_else(|| SparkleError::tool_not_found("slangc", self.hint(cx.host)))?;
        let url = format!(
            "https://github.com/shader-slang/slang/releases/download/v{}/{}",
            self.version, artifact
        );
        fetch_and_extract(cx, &url, "slang", staging).await?;

        let exe = staging.join("bin").join(cx.host.os.exe("slangc"));
        if exe.exists() {
            mark_executable(&exe).await?;
        }
        Ok(())
    }

    fn environment(&self, install: &Installation, _cx: &ResolveContext) -> ToolEnv {
        let mut env = ToolEnv::new();
        env.set("SLANGC_PATH", install.path.to_string_lossy());
        if let Some(bin) = install.path.parent() {
            env.prepend_path(bin);
        }
        env
    }

    fn hint(&self, _host: Host) -> String {
        format!(
            "Download slang {} from https://github.com/shader-slang/slang/releases and set SLANGC_PATH",
            self.version
        )
    }
}
